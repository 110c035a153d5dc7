//! HTTP handlers for the upload hook, admin label endpoints and search
use super::token::{TokenAction, TokenSigner};
use super::AdminError;
use crate::models::AttachmentId;
use crate::providers::LabelRecord;
use crate::services::search::ATTACHMENT_POST_TYPE;
use crate::services::{
    get_attachment_labels, render_label_preview, ContentQuery, SearchQueryAugmenter,
    UploadTrigger,
};
use crate::storage::{AttachmentRepository, ContentSearch, MetadataStore};
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const DEFAULT_SEARCH_LIMIT: i64 = 20;
const MAX_SEARCH_LIMIT: i64 = 100;

/// Shared handler state
#[derive(Clone)]
pub struct AdminState {
    pub metadata: Arc<dyn MetadataStore>,
    pub attachments: Arc<dyn AttachmentRepository>,
    pub search: Arc<dyn ContentSearch>,
    pub trigger: Arc<UploadTrigger>,
    pub tokens: Arc<TokenSigner>,
    pub augmenter: SearchQueryAugmenter,
}

#[derive(Debug, Deserialize)]
pub struct TokenQuery {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenBody {
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LabelsResponse {
    pub attachment_id: AttachmentId,
    pub labels: Vec<LabelRecord>,
    pub preview: String,
    pub update_labels_token: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route(
            "/hooks/attachments/{id}/metadata",
            web::post().to(attachment_metadata_updated),
        )
        .route("/attachments/search", web::get().to(search_attachments))
        .route("/admin/attachments/{id}/labels", web::get().to(get_labels))
        .route(
            "/admin/attachments/{id}/labels/refresh",
            web::post().to(refresh_labels),
        );
}

fn parse_attachment_id(raw: &str) -> Result<AttachmentId, AdminError> {
    Uuid::parse_str(raw).map_err(|_| AdminError::BadRequest("Invalid attachment ID".to_string()))
}

pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

/// Metadata-changed notification; responds with the metadata unchanged
pub async fn attachment_metadata_updated(
    state: web::Data<AdminState>,
    path: web::Path<String>,
    metadata: web::Json<Value>,
) -> Result<HttpResponse, AdminError> {
    let id = parse_attachment_id(&path)?;
    let metadata = state
        .trigger
        .on_update_attachment_metadata(id, metadata.into_inner())
        .await;
    Ok(HttpResponse::Ok().json(metadata))
}

/// Keyword-aware attachment search
pub async fn search_attachments(
    state: web::Data<AdminState>,
    params: web::Query<SearchParams>,
) -> Result<HttpResponse, AdminError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SEARCH_LIMIT)
        .clamp(1, MAX_SEARCH_LIMIT);

    let mut query = ContentQuery::new()
        .post_type(ATTACHMENT_POST_TYPE)
        .search(params.q.clone())
        .limit(limit);
    state.augmenter.prepare(&mut query);

    let ids = state.search.search_content(query).await?;
    Ok(HttpResponse::Ok().json(json!({ "ids": ids })))
}

/// Stored labels with their preview text
pub async fn get_labels(
    state: web::Data<AdminState>,
    path: web::Path<String>,
    query: web::Query<TokenQuery>,
) -> Result<HttpResponse, AdminError> {
    let id = parse_attachment_id(&path)?;
    if !state.tokens.verify(TokenAction::ViewLabels, id, &query.token) {
        return Err(AdminError::InvalidToken);
    }

    let labels = get_attachment_labels(state.metadata.as_ref(), id).await?;
    let preview = render_label_preview(&labels);
    let update_labels_token = state.tokens.generate(TokenAction::UpdateLabels, id)?;

    Ok(HttpResponse::Ok().json(LabelsResponse {
        attachment_id: id,
        labels,
        preview,
        update_labels_token,
    }))
}

/// Enqueue a fresh enrichment run
pub async fn refresh_labels(
    state: web::Data<AdminState>,
    path: web::Path<String>,
    body: web::Json<TokenBody>,
) -> Result<HttpResponse, AdminError> {
    let id = parse_attachment_id(&path)?;
    if !state.tokens.verify(TokenAction::UpdateLabels, id, &body.token) {
        return Err(AdminError::InvalidToken);
    }

    if state.attachments.attached_file(id).await?.is_none() {
        return Err(AdminError::NotFound(format!("attachment {}", id)));
    }

    state.trigger.schedule(id).await?;
    info!(attachment_id = %id, "Label refresh scheduled");

    Ok(HttpResponse::Accepted().json(json!({
        "attachment_id": id,
        "scheduled": true,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::{JobScheduler, ScheduledJob, SchedulerError};
    use crate::storage::{AttachmentFiles, MemoryStore, StorageError};
    use actix_web::{test, App};
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingScheduler {
        jobs: Mutex<Vec<ScheduledJob>>,
    }

    #[async_trait]
    impl JobScheduler for RecordingScheduler {
        async fn schedule_once(&self, job: ScheduledJob) -> Result<(), SchedulerError> {
            self.jobs.lock().unwrap().push(job);
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingSearch {
        sql: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ContentSearch for RecordingSearch {
        async fn search_content(&self, mut query: ContentQuery) -> Result<Vec<Uuid>, StorageError> {
            self.sql.lock().unwrap().push(query.build().sql().to_string());
            Ok(vec![])
        }
    }

    struct Fixture {
        state: AdminState,
        store: Arc<MemoryStore>,
        scheduler: Arc<RecordingScheduler>,
        search: Arc<RecordingSearch>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let scheduler = Arc::new(RecordingScheduler::default());
        let search = Arc::new(RecordingSearch::default());
        let trigger = Arc::new(UploadTrigger::new(
            store.clone(),
            Arc::new(AttachmentFiles::local()),
            scheduler.clone(),
        ));
        let state = AdminState {
            metadata: store.clone(),
            attachments: store.clone(),
            search: search.clone(),
            trigger,
            tokens: Arc::new(TokenSigner::new("test-secret", 86400)),
            augmenter: SearchQueryAugmenter::new(),
        };
        Fixture {
            state,
            store,
            scheduler,
            search,
        }
    }

    #[actix_web::test]
    async fn test_get_labels_with_valid_token() {
        let fx = fixture();
        let id = Uuid::new_v4();
        fx.store
            .set(
                id,
                "enrichment_labels",
                json!([
                    {"Name": "Cat", "Confidence": 95.2},
                    {"Name": "Animal", "Confidence": 88.0}
                ]),
            )
            .await
            .unwrap();
        let token = fx.state.tokens.generate(TokenAction::ViewLabels, id).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(fx.state.clone()))
                .configure(configure),
        )
        .await;

        let uri = format!("/admin/attachments/{}/labels?token={}", id, token);
        let req = test::TestRequest::get().uri(&uri).to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body["preview"], "Cat (95%), Animal (88%)");
        assert_eq!(body["labels"][0]["Name"], "Cat");
        assert_eq!(body["update_labels_token"].as_str().map(str::len), Some(97));

        // One-time token
        let req = test::TestRequest::get().uri(&uri).to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 403);
    }

    #[actix_web::test]
    async fn test_wrong_action_token_is_rejected() {
        let fx = fixture();
        let id = Uuid::new_v4();
        let token = fx.state.tokens.generate(TokenAction::UpdateLabels, id).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(fx.state.clone()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri(&format!("/admin/attachments/{}/labels?token={}", id, token))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 403);

        let req = test::TestRequest::get()
            .uri("/admin/attachments/not-a-uuid/labels?token=abc")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn test_refresh_schedules_job() {
        let fx = fixture();
        let id = Uuid::new_v4();
        fx.store.insert_attachment(id, "s3://mybucket/img.jpg");
        let token = fx.state.tokens.generate(TokenAction::UpdateLabels, id).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(fx.state.clone()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(&format!("/admin/attachments/{}/labels/refresh", id))
            .set_json(json!({ "token": token }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 202);

        let jobs = fx.scheduler.jobs.lock().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].attachment_id, id);
    }

    #[actix_web::test]
    async fn test_repeated_refresh_and_view_with_reissued_tokens() {
        let fx = fixture();
        let id = Uuid::new_v4();
        fx.store.insert_attachment(id, "s3://mybucket/img.jpg");
        fx.store
            .set(id, "enrichment_labels", json!([{"Name": "Cat", "Confidence": 95.2}]))
            .await
            .unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(fx.state.clone()))
                .configure(configure),
        )
        .await;
        let refresh_uri = format!("/admin/attachments/{}/labels/refresh", id);

        let token = fx.state.tokens.generate(TokenAction::UpdateLabels, id).unwrap();
        let req = test::TestRequest::post()
            .uri(&refresh_uri)
            .set_json(json!({ "token": token }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 202);

        let mut update_token = String::new();
        for _ in 0..2 {
            let view = fx.state.tokens.generate(TokenAction::ViewLabels, id).unwrap();
            let req = test::TestRequest::get()
                .uri(&format!("/admin/attachments/{}/labels?token={}", id, view))
                .to_request();
            let body: Value = test::call_and_read_body_json(&app, req).await;
            assert_eq!(body["preview"], "Cat (95%)");
            update_token = body["update_labels_token"].as_str().unwrap().to_string();
        }

        let req = test::TestRequest::post()
            .uri(&refresh_uri)
            .set_json(json!({ "token": update_token }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 202);

        let req = test::TestRequest::post()
            .uri(&refresh_uri)
            .set_json(json!({ "token": update_token }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 403);

        assert_eq!(fx.scheduler.jobs.lock().unwrap().len(), 2);
    }

    #[actix_web::test]
    async fn test_refresh_unknown_attachment() {
        let fx = fixture();
        let id = Uuid::new_v4();
        let token = fx.state.tokens.generate(TokenAction::UpdateLabels, id).unwrap();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(fx.state.clone()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri(&format!("/admin/attachments/{}/labels/refresh", id))
            .set_json(json!({ "token": token }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
        assert!(fx.scheduler.jobs.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_metadata_hook_passes_metadata_through() {
        let fx = fixture();
        let id = Uuid::new_v4();
        fx.store.insert_attachment(id, "/nonexistent/file.png");

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(fx.state.clone()))
                .configure(configure),
        )
        .await;

        let metadata = json!({ "width": 640, "sizes": {} });
        let req = test::TestRequest::post()
            .uri(&format!("/hooks/attachments/{}/metadata", id))
            .set_json(&metadata)
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body, metadata);
        assert!(fx.scheduler.jobs.lock().unwrap().is_empty());
    }

    #[actix_web::test]
    async fn test_search_is_widened_to_keywords() {
        let fx = fixture();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(fx.state.clone()))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/attachments/search?q=cat")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());

        let sql = fx.search.sql.lock().unwrap();
        assert_eq!(sql.len(), 1);
        assert!(sql[0].contains("LEFT JOIN post_meta AS enrichment_keywords"));
        assert!(sql[0].contains("GROUP BY posts.id"));
    }

    #[actix_web::test]
    async fn test_health() {
        let app = test::init_service(App::new().configure(configure)).await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }
}
