//! Explicit per-request context handed to the handlers.
//!
//! Everything a handler needs from the request (headers, form and query
//! values, the caller's identity) travels in a [`RequestContext`] value rather
//! than being read from ambient state.

use std::convert::Infallible;

use axum::extract::multipart::MultipartError;
use axum::extract::{FromRequestParts, Multipart, Query};
use axum::http::{header, request::Parts, HeaderMap};
use bytes::BytesMut;

use crate::media::{Identity, MediaStore};
use crate::response::is_conditional;
use crate::upload::spool::classify_transport_error;
use crate::upload::{ReceivedFile, TransferStatus, UploadBody, UploadFields};

use super::handlers::AppState;

/// Ordered name/value pairs from the query string and form body.
///
/// Names may repeat. List values use the `name[]` or `name[key]` convention.
#[derive(Debug, Clone, Default)]
pub struct FormFields(Vec<(String, String)>);

impl FormFields {
    pub fn new(pairs: Vec<(String, String)>) -> Self {
        Self(pairs)
    }

    pub fn extend(&mut self, pairs: impl IntoIterator<Item = (String, String)>) {
        self.0.extend(pairs);
    }

    /// Last non-empty value of `name`. Later values (the body) win.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(k, v)| k == name && !v.is_empty())
            .map(|(_, v)| v.as_str())
    }

    /// Values sent as `name[]` / `name[key]`, or `None` when there are none.
    pub fn get_list(&self, name: &str) -> Option<Vec<String>> {
        let values: Vec<String> = self
            .0
            .iter()
            .filter(|(k, _)| {
                k.strip_prefix(name)
                    .is_some_and(|rest| rest.starts_with('[') && rest.ends_with(']'))
            })
            .map(|(_, v)| v.clone())
            .collect();

        if values.is_empty() {
            None
        } else {
            Some(values)
        }
    }

    pub fn upload_fields(&self) -> UploadFields {
        UploadFields {
            caption: self.get("Caption").map(str::to_string),
            context_class: self.get("ContextClass").map(str::to_string),
            context_id: self.get("ContextID").map(str::to_string),
        }
    }
}

/// What a handler knows about the request it is serving.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub headers: HeaderMap,
    pub fields: FormFields,
    pub identity: Identity,
}

impl RequestContext {
    /// The client asked for the record instead of its bytes.
    ///
    /// Only when JSON is the preferred type; a browser listing it as a low
    /// quality fallback still gets the bytes.
    pub fn wants_json(&self) -> bool {
        self.headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
            .is_some_and(prefers_json)
    }

    pub fn is_conditional(&self) -> bool {
        is_conditional(&self.headers)
    }

    pub fn with_form(mut self, pairs: Vec<(String, String)>) -> Self {
        self.fields.extend(pairs);
        self
    }
}

/// Whether the highest-quality media range in an `Accept` value is JSON.
///
/// Ties go to the range listed first.
fn prefers_json(accept: &str) -> bool {
    let mut best: Option<(&str, f32)> = None;
    for range in accept.split(',') {
        let mut params = range.split(';');
        let media_type = params.next().unwrap_or_default().trim();
        if media_type.is_empty() {
            continue;
        }
        let quality = params
            .filter_map(|p| p.trim().strip_prefix("q="))
            .find_map(|q| q.trim().parse::<f32>().ok())
            .unwrap_or(1.0);
        if best.map_or(true, |(_, q)| quality > q) {
            best = Some((media_type, quality));
        }
    }
    best.is_some_and(|(media_type, q)| q > 0.0 && media_type.eq_ignore_ascii_case("application/json"))
}

impl<S> FromRequestParts<AppState<S>> for RequestContext
where
    S: MediaStore + 'static,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState<S>,
    ) -> Result<Self, Self::Rejection> {
        // A malformed query string is treated as empty
        let query = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map(|Query(pairs)| pairs)
            .unwrap_or_default();

        Ok(RequestContext {
            identity: state.access.identify(&parts.headers),
            headers: parts.headers.clone(),
            fields: FormFields::new(query),
        })
    }
}

/// Read a multipart body into files and plain fields.
///
/// File parts are buffered up to `max_size` bytes each. A transport failure
/// is recorded against `upload_field` and ends reading, since the rest of the
/// body can no longer be trusted.
pub async fn read_multipart(
    mut multipart: Multipart,
    upload_field: &str,
    max_size: usize,
) -> (Vec<ReceivedFile>, Vec<(String, String)>) {
    let mut files = Vec::new();
    let mut fields = Vec::new();

    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                files.push(ReceivedFile::failed(upload_field, classify_multipart(&e)));
                break;
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        let Some(file_name) = field.file_name().map(str::to_string) else {
            match field.text().await {
                Ok(value) => fields.push((name, value)),
                Err(e) => {
                    files.push(ReceivedFile::failed(upload_field, classify_multipart(&e)));
                    break;
                }
            }
            continue;
        };

        let mut buf = BytesMut::new();
        let mut status = TransferStatus::Complete;
        loop {
            match field.chunk().await {
                Ok(Some(chunk)) => {
                    if buf.len() + chunk.len() > max_size {
                        status = TransferStatus::SizeExceeded;
                        break;
                    }
                    buf.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) => {
                    status = classify_multipart(&e);
                    break;
                }
            }
        }

        // Browsers send an empty, unnamed part when no file was chosen
        if status == TransferStatus::Complete && file_name.is_empty() && buf.is_empty() {
            status = TransferStatus::NoFile;
        }

        let complete = status == TransferStatus::Complete;
        files.push(ReceivedFile {
            field_name: name,
            file_name: Some(file_name).filter(|f| !f.is_empty()),
            body: complete.then(|| UploadBody::Buffered(buf.freeze())),
            status,
        });
        if !complete {
            break;
        }
    }

    (files, fields)
}

fn classify_multipart(err: &MultipartError) -> TransferStatus {
    classify_transport_error(Some(err.status()), &err.body_text())
}
