use async_trait::async_trait;
use bytes::Bytes;
use duet_http::dispatch::accumulate;
use http::HeaderMap;
use http::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::extract::{Form, FromRequest, Json, ParsedBody};
use crate::{OptionReqBody, RequestContext, WebError};

/// Reads the whole body, giving up as soon as it grows past the context's limit.
async fn read_limited(req: &RequestContext<'_, '_>, body: OptionReqBody) -> Result<Bytes, WebError> {
    let limit = req.body_limit();
    body.apply(|b| async move { accumulate(b, limit).await.map(|buf| buf.freeze()).map_err(WebError::from) }).await
}

fn media_type(headers: &HeaderMap) -> Option<mime::Mime> {
    headers.get(CONTENT_TYPE)?.to_str().ok()?.parse().ok()
}

fn is_json(headers: &HeaderMap) -> bool {
    media_type(headers).is_some_and(|m| {
        m.type_() == mime::APPLICATION && (m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON))
    })
}

fn is_form(headers: &HeaderMap) -> bool {
    media_type(headers).is_some_and(|m| m.essence_str() == mime::APPLICATION_WWW_FORM_URLENCODED.essence_str())
}

#[async_trait]
impl FromRequest for Bytes {
    type Error = WebError;

    async fn from_request(req: &RequestContext<'_, '_>, body: OptionReqBody) -> Result<Self, Self::Error> {
        read_limited(req, body).await
    }
}

#[async_trait]
impl FromRequest for String {
    type Error = WebError;

    async fn from_request(req: &RequestContext<'_, '_>, body: OptionReqBody) -> Result<Self, Self::Error> {
        let bytes = read_limited(req, body).await?;
        String::from_utf8(bytes.into()).map_err(|_utf8| WebError::InvalidUtf8)
    }
}

#[async_trait]
impl<T> FromRequest for Json<T>
where
    T: DeserializeOwned + Send,
{
    type Error = WebError;

    async fn from_request(req: &RequestContext<'_, '_>, body: OptionReqBody) -> Result<Self, Self::Error> {
        if !is_json(req.headers()) {
            return Err(WebError::UnsupportedMediaType);
        }

        let bytes = read_limited(req, body).await?;
        let text: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) { b"{}" } else { &bytes };

        // strict: only objects and arrays at the top level
        let first = text.iter().find(|b| !b.is_ascii_whitespace());
        if !matches!(first, Some(b'{' | b'[')) {
            return Err(WebError::InvalidJson("top-level value must be an object or an array".into()));
        }

        serde_json::from_slice(text).map(Json).map_err(|e| WebError::InvalidJson(e.to_string()))
    }
}

#[async_trait]
impl<T> FromRequest for Form<T>
where
    T: DeserializeOwned + Send,
{
    type Error = WebError;

    async fn from_request(req: &RequestContext<'_, '_>, body: OptionReqBody) -> Result<Self, Self::Error> {
        if !is_form(req.headers()) {
            return Err(WebError::UnsupportedMediaType);
        }

        let bytes = read_limited(req, body).await?;
        serde_urlencoded::from_bytes(&bytes).map(Form).map_err(|e| WebError::InvalidForm(e.to_string()))
    }
}

#[async_trait]
impl FromRequest for ParsedBody {
    type Error = WebError;

    async fn from_request(req: &RequestContext<'_, '_>, body: OptionReqBody) -> Result<Self, Self::Error> {
        if is_json(req.headers()) {
            let Json(value) = Json::<Value>::from_request(req, body).await?;
            return Ok(ParsedBody(value));
        }

        if is_form(req.headers()) {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, body).await?;
            let map: Map<String, Value> = pairs.into_iter().map(|(k, v)| (k, Value::String(v))).collect();
            return Ok(ParsedBody(Value::Object(map)));
        }

        Ok(ParsedBody(Value::Object(Map::new())))
    }
}
