//! HTTP server layer for the media server.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │   /open/{id}  /thumbnail/{id}/{spec}  /upload  /delete  ...     │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌──────────┐  ┌───────────┐  │
//! │  │  handlers   │  │   request   │  │responder │  │  routes   │  │
//! │  │ (actions)   │  │  (context)  │  │ (errors) │  │ (router)  │  │
//! │  └─────────────┘  └─────────────┘  └──────────┘  └───────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod request;
pub mod responder;
pub mod routes;

pub use handlers::{
    browse_filter, browse_handler, caption_handler, delete_handler, delete_one_handler,
    download_handler, download_named_handler, health_handler, info_handler, open_handler,
    open_variant_handler, set_caption_handler, thumbnail_handler, thumbnail_spec_handler,
    upload_form_handler, upload_put_handler, AppState, BrowseResponse, HealthResponse,
    RecordResponse,
};
pub use request::{read_multipart, FormFields, RequestContext};
pub use responder::{ErrorResponse, NOT_FOUND_MESSAGE, UNAUTHORIZED_MESSAGE};
pub use routes::{create_router, RouterConfig, MULTIPART_OVERHEAD};
