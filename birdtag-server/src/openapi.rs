//! OpenAPI documentation configuration
//!
//! Generates the OpenAPI 3.0 specification for the BirdTag API.

use utoipa::OpenApi;

use crate::handlers::{
    events::{BucketRef, ObjectRecord, ObjectRef, S3Entity},
    AcceptedResponse, CatalogEventRequest, DeleteRequest, DeleteResponse, FailedTarget,
    HealthResponse, ObjectCreatedNotification, PollRequest, PollResponse, PresignRequest,
    PresignResponse, QueryRequest, QueryResponse, ReadyResponse, SearchResponse,
    SubscribeRequest, SubscriptionResponse, TagEditRequest, TagEditResponse, UploadResponse,
};

/// BirdTag API - OpenAPI Documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "BirdTag API",
        version = "0.1.0",
        description = r#"
## Species tagging and tag search for bird media

BirdTag tags uploaded images, videos and audio recordings with the bird
species a detector finds in them, and lets owners search their catalog:

- **Tag queries** - items carrying at least N of each requested species
- **Content search** - upload a probe file; its species become the query
- **Manual edits** - add or remove species counts, delete items
- **Subscriptions** - be notified when items with followed species change

### How It Works

1. **Upload** media via `POST /uploads`; detection runs in the background
2. **Query** via `POST /query` or `GET /query?user_id=..&tag1=crow&count1=2`
3. **Search** by example via `POST /search`, then poll `POST /search/results`
4. Result links are presigned `GET /objects/{key}` URLs with an expiry
"#,
        license(name = "MIT OR Apache-2.0")
    ),
    servers(
        (url = "http://localhost:3000", description = "Local development server")
    ),
    tags(
        (name = "Media", description = "Catalog uploads, tag edits and deletion"),
        (name = "Query", description = "Species threshold queries over the caller's catalog"),
        (name = "Search", description = "Content search by probe file"),
        (name = "Subscriptions", description = "Species subscriptions and notifications"),
        (name = "Events", description = "Object-created and catalog mutation event ingress"),
        (name = "Objects", description = "Presigned object retrieval"),
        (name = "Health", description = "Service health and readiness endpoints")
    ),
    paths(
        crate::handlers::health::health,
        crate::handlers::health::ready,
        crate::handlers::uploads::upload_handler,
        crate::handlers::uploads::search_handler,
        crate::handlers::jobs::poll_handler,
        crate::handlers::query::query_handler,
        crate::handlers::query::query_get_handler,
        crate::handlers::files::edit_tags_handler,
        crate::handlers::files::delete_files_handler,
        crate::handlers::subscriptions::subscribe_handler,
        crate::handlers::subscriptions::list_subscriptions_handler,
        crate::handlers::events::object_created_handler,
        crate::handlers::events::catalog_event_handler,
        crate::handlers::objects::get_object_handler,
        crate::handlers::objects::presign_handler,
    ),
    components(
        schemas(
            HealthResponse,
            ReadyResponse,
            UploadResponse,
            SearchResponse,
            PollRequest,
            PollResponse,
            QueryRequest,
            QueryResponse,
            TagEditRequest,
            TagEditResponse,
            DeleteRequest,
            DeleteResponse,
            FailedTarget,
            SubscribeRequest,
            SubscriptionResponse,
            ObjectCreatedNotification,
            ObjectRecord,
            S3Entity,
            BucketRef,
            ObjectRef,
            CatalogEventRequest,
            AcceptedResponse,
            PresignRequest,
            PresignResponse,
        )
    )
)]
pub struct ApiDoc;
