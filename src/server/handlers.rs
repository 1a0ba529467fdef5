//! HTTP request handlers for the media API.
//!
//! # Endpoints
//!
//! - `GET /health` - Health check endpoint
//! - `GET /`, `GET /browse` - List records
//! - `POST /`, `POST /upload` - Multipart upload
//! - `PUT /upload` - Raw body upload
//! - `GET /open/{id}[/{variant}]`, `GET /{id}[/{variant}]` - Stream a variant
//! - `GET /download/{id}[/{filename}]` - Download the original as an attachment
//! - `GET /info/{id}` - Record metadata
//! - `GET|POST /caption/{id}` - Read or set the caption
//! - `POST|DELETE /delete[/{id}]` - Delete one or many records
//! - `GET /thumbnail/{id}[/{spec}][/cropped]` - Serve a derived thumbnail

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{
        multipart::MultipartRejection, rejection::FormRejection, Form, Multipart, Path, State,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::MediaSettings;
use crate::delete::{delete_targets, DeleteBatcher, DeleteOutcome};
use crate::error::MediaError;
use crate::media::{
    parse_media_id, AccessControl, AllowListContexts, BrowseFilter, ContextResolver, MediaRecord,
    MediaStore, OpenAccess,
};
use crate::response::CachePolicy;
use crate::stream::{RangeStreamer, StreamRequest};
use crate::thumbnail::{ThumbnailCache, ThumbnailPipeline, ThumbnailRenderer, ThumbnailSpec};
use crate::upload::{spool_to_temp, ReceivedFile, UploadBody, UploadIngestor, UploadOutcome};

use super::request::{read_multipart, FormFields, RequestContext};

// =============================================================================
// Application State
// =============================================================================

/// Shared application state holding the request components.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<S: MediaStore> {
    pub store: Arc<S>,
    pub streamer: Arc<RangeStreamer<S>>,
    pub thumbnails: Arc<ThumbnailPipeline<S>>,
    pub uploads: Arc<UploadIngestor<S>>,
    pub deletes: Arc<DeleteBatcher<S>>,

    /// Read/write/upload policy
    pub access: Arc<dyn AccessControl>,

    pub settings: Arc<MediaSettings>,
}

impl<S: MediaStore + 'static> AppState<S> {
    /// Build the components over `store`.
    ///
    /// Access is open and contexts resolve against the configured class list
    /// until [`with_access`](Self::with_access) and
    /// [`with_contexts`](Self::with_contexts) say otherwise.
    pub fn new(store: Arc<S>, settings: MediaSettings) -> Self {
        let cache_policy = CachePolicy::new(settings.cache_max_age);
        let thumbnails = ThumbnailPipeline::with_parts(
            Arc::clone(&store),
            ThumbnailCache::with_capacity(settings.thumbnail_cache_size),
            ThumbnailRenderer::with_quality(settings.jpeg_quality),
            cache_policy,
        );
        let contexts = Arc::new(AllowListContexts::new(settings.context_classes.clone()));

        Self {
            streamer: Arc::new(RangeStreamer::new(Arc::clone(&store), cache_policy)),
            thumbnails: Arc::new(thumbnails),
            uploads: Arc::new(Self::build_ingestor(&store, contexts, &settings)),
            deletes: Arc::new(DeleteBatcher::new(Arc::clone(&store))),
            access: Arc::new(OpenAccess),
            settings: Arc::new(settings),
            store,
        }
    }

    pub fn with_access(mut self, access: Arc<dyn AccessControl>) -> Self {
        self.access = access;
        self
    }

    /// Replace the resolver used to validate upload contexts.
    pub fn with_contexts(mut self, contexts: Arc<dyn ContextResolver>) -> Self {
        self.uploads = Arc::new(Self::build_ingestor(&self.store, contexts, &self.settings));
        self
    }

    fn build_ingestor(
        store: &Arc<S>,
        contexts: Arc<dyn ContextResolver>,
        settings: &MediaSettings,
    ) -> UploadIngestor<S> {
        UploadIngestor::new(Arc::clone(store), contexts).with_field_name(&settings.upload_field)
    }

    async fn load_record(&self, raw_id: &str) -> Result<MediaRecord, MediaError> {
        let id = parse_media_id(raw_id)
            .ok_or_else(|| MediaError::not_found(format!("invalid media id {:?}", raw_id)))?;
        self.store
            .get(id)
            .await?
            .ok_or_else(|| MediaError::not_found(format!("media {}", id)))
    }
}

impl<S: MediaStore> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            streamer: Arc::clone(&self.streamer),
            thumbnails: Arc::clone(&self.thumbnails),
            uploads: Arc::clone(&self.uploads),
            deletes: Arc::clone(&self.deletes),
            access: Arc::clone(&self.access),
            settings: Arc::clone(&self.settings),
        }
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// A single record wrapped in the success envelope.
#[derive(Debug, Serialize)]
pub struct RecordResponse {
    pub success: bool,
    pub data: MediaRecord,
}

impl RecordResponse {
    fn new(data: MediaRecord) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// Browse response.
#[derive(Debug, Serialize)]
pub struct BrowseResponse {
    pub success: bool,
    pub data: Vec<MediaRecord>,

    /// Number of records in `data`
    pub total: usize,
}

/// Build the browse filter from request values.
///
/// `ContextID` is only honoured when numeric. `limit` is capped at
/// `max_limit`, which is also the default.
pub fn browse_filter(fields: &FormFields, max_limit: usize) -> BrowseFilter {
    let limit = fields
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&v| v > 0)
        .map_or(max_limit, |v| v.min(max_limit));

    BrowseFilter {
        context_class: fields.get("ContextClass").map(str::to_string),
        context_id: fields.get("ContextID").and_then(parse_media_id),
        limit,
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle browse requests.
///
/// # Query Parameters
///
/// - `ContextClass`: Only records attached to this class
/// - `ContextID`: Only records attached to this entity id (numeric)
/// - `limit`: Maximum number of records (capped at the configured limit)
///
/// Records the caller may not read are left out.
pub async fn browse_handler<S: MediaStore + 'static>(
    State(state): State<AppState<S>>,
    ctx: RequestContext,
) -> Result<Json<BrowseResponse>, MediaError> {
    let filter = browse_filter(&ctx.fields, state.settings.browse_limit);
    let data: Vec<MediaRecord> = state
        .store
        .browse(&filter)
        .await?
        .into_iter()
        .filter(|record| state.access.check_read(ctx.identity, record).is_ok())
        .collect();

    Ok(Json(BrowseResponse {
        success: true,
        total: data.len(),
        data,
    }))
}

/// Stream the original of a record.
///
/// # Endpoint
///
/// `GET /open/{id}` or `GET /{id}`
///
/// # Response
///
/// - `200 OK` / `206 Partial Content`: The bytes, honouring `Range`
/// - `304 Not Modified`: The request carried a cache validator
/// - `404 Not Found`: Missing record or variant, or the caller may not read it
/// - `416 Range Not Satisfiable`: Malformed or out-of-bounds `Range`
///
/// When `Accept` prefers `application/json` the record is returned instead of its bytes.
pub async fn open_handler<S: MediaStore + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> Result<Response, MediaError> {
    open_media(&state, &id, None, &ctx).await
}

/// Stream a named variant of a record.
///
/// # Endpoint
///
/// `GET /open/{id}/{variant}` or `GET /{id}/{variant}`
pub async fn open_variant_handler<S: MediaStore + 'static>(
    State(state): State<AppState<S>>,
    Path((id, variant)): Path<(String, String)>,
    ctx: RequestContext,
) -> Result<Response, MediaError> {
    open_media(&state, &id, Some(&variant), &ctx).await
}

async fn open_media<S: MediaStore + 'static>(
    state: &AppState<S>,
    raw_id: &str,
    variant: Option<&str>,
    ctx: &RequestContext,
) -> Result<Response, MediaError> {
    let record = state.load_record(raw_id).await?;

    // Reported as missing so the response does not confirm the record exists
    state
        .access
        .check_read(ctx.identity, &record)
        .map_err(|_| MediaError::not_found(format!("media {} not readable", record.id)))?;

    if ctx.wants_json() {
        return Ok(RecordResponse::new(record).into_response());
    }

    let request = StreamRequest::from_headers(variant, &ctx.headers);
    Ok(state.streamer.stream(&record, &request).await?.into_response())
}

/// Download the original as an attachment.
///
/// # Endpoint
///
/// `GET /download/{id}`
pub async fn download_handler<S: MediaStore + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> Result<Response, MediaError> {
    download_media(&state, &id, None, &ctx).await
}

/// Download the original under the given filename.
///
/// # Endpoint
///
/// `GET /download/{id}/{filename}`
pub async fn download_named_handler<S: MediaStore + 'static>(
    State(state): State<AppState<S>>,
    Path((id, filename)): Path<(String, String)>,
    ctx: RequestContext,
) -> Result<Response, MediaError> {
    download_media(&state, &id, Some(&filename), &ctx).await
}

async fn download_media<S: MediaStore + 'static>(
    state: &AppState<S>,
    raw_id: &str,
    filename: Option<&str>,
    ctx: &RequestContext,
) -> Result<Response, MediaError> {
    let record = state.load_record(raw_id).await?;
    state.access.check_read(ctx.identity, &record)?;

    Ok(state
        .streamer
        .download(&record, filename)
        .await?
        .into_response())
}

/// Return a record's metadata.
///
/// # Endpoint
///
/// `GET /info/{id}`
///
/// # Errors
///
/// - `401 Unauthorized`: The caller may not read the record
/// - `404 Not Found`: Record not found
pub async fn info_handler<S: MediaStore + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> Result<Json<RecordResponse>, MediaError> {
    let record = state.load_record(&id).await?;
    state.access.check_read(ctx.identity, &record)?;
    Ok(RecordResponse::new(record))
}

/// Return a record with its current caption.
///
/// # Endpoint
///
/// `GET /caption/{id}`
///
/// Requires write access even though nothing changes.
pub async fn caption_handler<S: MediaStore + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> Result<Json<RecordResponse>, MediaError> {
    state.access.check_write(ctx.identity, None)?;
    let record = state.load_record(&id).await?;
    Ok(RecordResponse::new(record))
}

/// Set a record's caption from the `Caption` field.
///
/// # Endpoint
///
/// `POST /caption/{id}`
///
/// A request without a `Caption` value clears the caption.
pub async fn set_caption_handler<S: MediaStore + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    ctx: RequestContext,
    form: Result<Form<Vec<(String, String)>>, FormRejection>,
) -> Result<Json<RecordResponse>, MediaError> {
    state.access.check_write(ctx.identity, None)?;
    let ctx = ctx.with_form(form_pairs(form));

    let mut record = state.load_record(&id).await?;
    state.access.check_write(ctx.identity, Some(&record))?;

    record.caption = ctx.fields.get("Caption").map(str::to_string);
    state.store.save(&record).await?;
    info!(media_id = record.id, "Caption updated");

    Ok(RecordResponse::new(record))
}

/// Delete the records named by `mediaID` or `media[]`.
///
/// # Endpoint
///
/// `POST /delete` or `DELETE /delete`
///
/// # Response
///
/// `200 OK` listing the records actually deleted. A missing identifier fails
/// the request with `404`, but deletions made before it are kept.
pub async fn delete_handler<S: MediaStore + 'static>(
    State(state): State<AppState<S>>,
    ctx: RequestContext,
    form: Result<Form<Vec<(String, String)>>, FormRejection>,
) -> Result<Json<DeleteOutcome>, MediaError> {
    delete_media(&state, None, ctx.with_form(form_pairs(form))).await
}

/// Delete the record named in the path.
///
/// # Endpoint
///
/// `POST /delete/{id}` or `DELETE /delete/{id}`
pub async fn delete_one_handler<S: MediaStore + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    ctx: RequestContext,
    form: Result<Form<Vec<(String, String)>>, FormRejection>,
) -> Result<Json<DeleteOutcome>, MediaError> {
    delete_media(&state, Some(&id), ctx.with_form(form_pairs(form))).await
}

async fn delete_media<S: MediaStore + 'static>(
    state: &AppState<S>,
    path_id: Option<&str>,
    ctx: RequestContext,
) -> Result<Json<DeleteOutcome>, MediaError> {
    state.access.check_write(ctx.identity, None)?;

    let targets = delete_targets(
        path_id,
        ctx.fields.get("mediaID"),
        ctx.fields.get_list("media"),
    );
    debug!(count = targets.len(), "Delete requested");

    // Evict before reporting, so records removed ahead of a failure are
    // cleaned up too.
    let report = state.deletes.delete_all(&targets).await;
    for record in &report.deleted {
        state.thumbnails.cache().remove_media(record.id).await;
    }

    Ok(Json(report.into_result()?))
}

/// Handle multipart uploads.
///
/// # Endpoint
///
/// `POST /upload` or `POST /`
///
/// # Form Fields
///
/// - the configured upload field (default `mediaFile`): The file
/// - `Caption`: Caption, defaults to the filename without its extension
/// - `ContextClass` / `ContextID`: Entity to attach the media to
///
/// # Errors
///
/// - `400 Bad Request`: Upload or context validation failed
/// - `401 Unauthorized`: The caller may not upload
pub async fn upload_form_handler<S: MediaStore + 'static>(
    State(state): State<AppState<S>>,
    ctx: RequestContext,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadOutcome>, MediaError> {
    state.access.check_upload(ctx.identity)?;

    let (files, pairs) = match multipart {
        Ok(multipart) => {
            read_multipart(
                multipart,
                &state.settings.upload_field,
                state.settings.max_upload_size,
            )
            .await
        }
        Err(e) => {
            debug!(error = %e, "Upload request is not multipart");
            (Vec::new(), Vec::new())
        }
    };

    let ctx = ctx.with_form(pairs);
    let outcome = state.uploads.ingest(files, &ctx.fields.upload_fields()).await?;
    Ok(Json(outcome))
}

/// Handle raw body uploads.
///
/// # Endpoint
///
/// `PUT /upload`
///
/// The body is the file itself and is spooled to a temporary file. Caption,
/// context and the original `filename` come from the query string.
pub async fn upload_put_handler<S: MediaStore + 'static>(
    State(state): State<AppState<S>>,
    ctx: RequestContext,
    body: Body,
) -> Result<Json<UploadOutcome>, MediaError> {
    state.access.check_upload(ctx.identity)?;

    let field = state.uploads.field_name().to_string();
    let file = match spool_to_temp(body.into_data_stream(), state.settings.max_upload_size).await
    {
        Ok(spooled) => ReceivedFile::complete(
            field,
            ctx.fields.get("filename").map(str::to_string),
            UploadBody::Spooled(spooled),
        ),
        Err(status) => ReceivedFile::failed(field, status),
    };

    let outcome = state
        .uploads
        .ingest(vec![file], &ctx.fields.upload_fields())
        .await?;
    Ok(Json(outcome))
}

/// Serve the default-size thumbnail.
///
/// # Endpoint
///
/// `GET /thumbnail/{id}`
pub async fn thumbnail_handler<S: MediaStore + 'static>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
    ctx: RequestContext,
) -> Result<Response, MediaError> {
    serve_thumbnail(&state, &id, "", &ctx).await
}

/// Serve a thumbnail described by the rest of the path.
///
/// # Endpoint
///
/// `GET /thumbnail/{id}/{spec}[/cropped]`
///
/// `spec` is `{w}x{h}` or `{w}x{h}x{RRGGBB}`. An unparseable spec falls back
/// to the configured default size.
pub async fn thumbnail_spec_handler<S: MediaStore + 'static>(
    State(state): State<AppState<S>>,
    Path((id, rest)): Path<(String, String)>,
    ctx: RequestContext,
) -> Result<Response, MediaError> {
    serve_thumbnail(&state, &id, &rest, &ctx).await
}

async fn serve_thumbnail<S: MediaStore + 'static>(
    state: &AppState<S>,
    raw_id: &str,
    spec_path: &str,
    ctx: &RequestContext,
) -> Result<Response, MediaError> {
    // Thumbnail URLs never change meaning, so a validator is enough
    if ctx.is_conditional() {
        return Ok(state.thumbnails.cache_policy().not_modified().into_response());
    }

    let record = state.load_record(raw_id).await?;
    state
        .access
        .check_read(ctx.identity, &record)
        .map_err(|_| MediaError::not_found(format!("media {} not readable", record.id)))?;

    let spec = ThumbnailSpec::from_path(spec_path, state.settings.default_thumbnail);
    Ok(state
        .thumbnails
        .serve(&record, spec, false)
        .await?
        .into_response())
}

fn form_pairs(form: Result<Form<Vec<(String, String)>>, FormRejection>) -> Vec<(String, String)> {
    match form {
        Ok(Form(pairs)) => pairs,
        Err(e) => {
            debug!(error = %e, "Ignoring request body");
            Vec::new()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
