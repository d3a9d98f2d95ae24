//! Catalog admin pages.
//!
//! - `GET  /admin`                      product table
//! - `GET  /admin/products/new`         create form
//! - `POST /admin/products/new`         create
//! - `GET  /admin/products/{id}/edit`   edit form
//! - `POST /admin/products/{id}/edit`   partial update
//! - `POST /admin/products/{id}/delete` delete
//!
//! Successful posts redirect to `/admin?notice=<code>`. Invalid input re-renders
//! the form with a danger notice.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shopkeep_core::domain::product::{NewProduct, Product, ProductId, ProductPatch};
use shopkeep_core::errors::{ApplicationError, DomainError};
use shopkeep_db::{CatalogRepository, RepositoryError};
use tera::{Context, Tera};
use tracing::{error, info, warn};

#[derive(Clone)]
pub struct AdminState {
    catalog: Arc<dyn CatalogRepository>,
    templates: Arc<Tera>,
}

impl AdminState {
    pub fn new(catalog: Arc<dyn CatalogRepository>) -> Self {
        Self { catalog, templates: init_templates() }
    }
}

fn init_templates() -> Arc<Tera> {
    let mut tera = Tera::default();
    if let Err(error) = tera.add_raw_templates(vec![
        ("base.html", include_str!("../../../templates/admin/base.html")),
        ("index.html", include_str!("../../../templates/admin/index.html")),
        ("form.html", include_str!("../../../templates/admin/form.html")),
    ]) {
        warn!(error = %error, "admin templates failed to compile; pages will render an error");
    }
    Arc::new(tera)
}

pub fn router(catalog: Arc<dyn CatalogRepository>) -> Router {
    Router::new()
        .route("/admin", get(index_page))
        .route("/admin/products/new", get(new_product_page).post(create_product))
        .route("/admin/products/{id}/edit", get(edit_product_page).post(update_product))
        .route("/admin/products/{id}/delete", post(delete_product))
        .with_state(AdminState::new(catalog))
}

// ---------------------------------------------------------------------------
// Notices
// ---------------------------------------------------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Notice {
    pub level: &'static str,
    pub message: String,
}

impl Notice {
    fn danger(message: impl Into<String>) -> Self {
        Self { level: "danger", message: message.into() }
    }

    /// Maps a redirect code back to its banner. Unknown codes show nothing.
    fn from_code(code: &str) -> Option<Self> {
        let (level, message) = match code {
            "created" => ("success", "Product created."),
            "updated" => ("success", "Product updated."),
            "deleted" => ("success", "Product deleted."),
            "unchanged" => ("info", "No changes were submitted."),
            "not_found" => ("danger", "Product not found."),
            "already_gone" => ("info", "That product no longer exists; nothing was deleted."),
            _ => return None,
        };
        Some(Self { level, message: message.to_string() })
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct NoticeQuery {
    pub notice: Option<String>,
}

fn redirect_with(code: &str) -> Response {
    Redirect::to(&format!("/admin?notice={code}")).into_response()
}

// ---------------------------------------------------------------------------
// Form handling
// ---------------------------------------------------------------------------

/// Raw form fields. Kept as text so a bad value can be echoed back.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProductForm {
    pub name: String,
    pub price: String,
    pub stock: String,
    pub category: String,
}

impl ProductForm {
    fn from_product(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            price: product.price.to_string(),
            stock: product.stock.to_string(),
            category: product.category.clone(),
        }
    }

    fn to_new_product(&self) -> Result<NewProduct, DomainError> {
        let product = NewProduct {
            name: self.name.clone(),
            price: parse_price(&self.price)?,
            stock: parse_stock(&self.stock)?,
            category: self.category.clone(),
        }
        .normalized();
        product.validate()?;
        Ok(product)
    }

    /// Blank fields are left out of the patch.
    fn to_patch(&self) -> Result<ProductPatch, DomainError> {
        let patch = ProductPatch {
            name: non_blank(&self.name),
            price: non_blank(&self.price).map(|raw| parse_price(&raw)).transpose()?,
            stock: non_blank(&self.stock).map(|raw| parse_stock(&raw)).transpose()?,
            category: non_blank(&self.category),
        };
        patch.validate()?;
        Ok(patch)
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn parse_price(raw: &str) -> Result<Decimal, DomainError> {
    Decimal::from_str(raw.trim()).map_err(|_| {
        DomainError::InvalidProduct(format!("price `{}` is not a number", raw.trim()))
    })
}

fn parse_stock(raw: &str) -> Result<u32, DomainError> {
    raw.trim().parse::<u32>().map_err(|_| {
        DomainError::InvalidProduct(format!(
            "stock `{}` must be a whole number of zero or more",
            raw.trim()
        ))
    })
}

fn application_error(error: RepositoryError) -> ApplicationError {
    match error {
        RepositoryError::Invalid(domain) => ApplicationError::Domain(domain),
        other => ApplicationError::Persistence(other.to_string()),
    }
}

#[derive(Serialize)]
struct ProductRow {
    id: String,
    name: String,
    price: String,
    stock: u32,
    category: String,
}

impl From<Product> for ProductRow {
    fn from(product: Product) -> Self {
        Self {
            id: product.id.0,
            name: product.name,
            price: product.price.to_string(),
            stock: product.stock,
            category: product.category,
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn render(state: &AdminState, template: &str, context: &Context, status: StatusCode) -> Response {
    match state.templates.render(template, context) {
        Ok(html) => (status, Html(html)).into_response(),
        Err(error) => {
            error!(
                event_name = "admin.template.failed",
                template = template,
                error = ?error,
                "admin template failed to render"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, Html("<h1>Template Error</h1>".to_string()))
                .into_response()
        }
    }
}

fn render_index(
    state: &AdminState,
    products: Vec<Product>,
    notice: Option<Notice>,
    status: StatusCode,
) -> Response {
    let rows: Vec<ProductRow> = products.into_iter().map(ProductRow::from).collect();
    let mut context = Context::new();
    context.insert("products", &rows);
    context.insert("notice", &notice);
    render(state, "index.html", &context, status)
}

fn render_form(
    state: &AdminState,
    editing: Option<&ProductId>,
    form: &ProductForm,
    notice: Option<Notice>,
    status: StatusCode,
) -> Response {
    let (title, action) = match editing {
        Some(id) => (format!("Edit {}", form.name), format!("/admin/products/{id}/edit")),
        None => ("New product".to_string(), "/admin/products/new".to_string()),
    };
    let mut context = Context::new();
    context.insert("title", &title);
    context.insert("action", &action);
    context.insert("editing", &editing.is_some());
    context.insert("form", form);
    context.insert("notice", &notice);
    render(state, "form.html", &context, status)
}

/// The table is still worth showing when a write failed, so a failed read here
/// degrades to an empty listing.
async fn index_after_failure(state: &AdminState, error: ApplicationError) -> Response {
    let products = state.catalog.list_all().await.unwrap_or_default();
    render_index(
        state,
        products,
        Some(Notice::danger(error.user_message())),
        StatusCode::SERVICE_UNAVAILABLE,
    )
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub async fn index_page(
    State(state): State<AdminState>,
    Query(query): Query<NoticeQuery>,
) -> Response {
    let notice = query.notice.as_deref().and_then(Notice::from_code);
    match state.catalog.list_all().await {
        Ok(products) => render_index(&state, products, notice, StatusCode::OK),
        Err(error) => {
            error!(event_name = "admin.catalog.list_failed", error = %error, "listing failed");
            render_index(
                &state,
                Vec::new(),
                Some(Notice::danger(application_error(error).user_message())),
                StatusCode::SERVICE_UNAVAILABLE,
            )
        }
    }
}

pub async fn new_product_page(State(state): State<AdminState>) -> Response {
    render_form(&state, None, &ProductForm::default(), None, StatusCode::OK)
}

pub async fn create_product(
    State(state): State<AdminState>,
    Form(form): Form<ProductForm>,
) -> Response {
    let draft = match form.to_new_product() {
        Ok(draft) => draft,
        Err(error) => {
            let notice = Notice::danger(ApplicationError::from(error).user_message());
            return render_form(&state, None, &form, Some(notice), StatusCode::UNPROCESSABLE_ENTITY);
        }
    };

    match state.catalog.create(draft).await {
        Ok(product) => {
            info!(
                event_name = "admin.product.created",
                product_id = %product.id,
                name = %product.name,
                "product created"
            );
            redirect_with("created")
        }
        Err(error) => {
            error!(event_name = "admin.product.create_failed", error = %error, "create failed");
            index_after_failure(&state, application_error(error)).await
        }
    }
}

pub async fn edit_product_page(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Response {
    let id = ProductId(id);
    match state.catalog.get(&id).await {
        Ok(Some(product)) => {
            render_form(&state, Some(&id), &ProductForm::from_product(&product), None, StatusCode::OK)
        }
        Ok(None) => redirect_with("not_found"),
        Err(error) => {
            error!(event_name = "admin.product.get_failed", product_id = %id, error = %error, "lookup failed");
            index_after_failure(&state, application_error(error)).await
        }
    }
}

pub async fn update_product(
    State(state): State<AdminState>,
    Path(id): Path<String>,
    Form(form): Form<ProductForm>,
) -> Response {
    let id = ProductId(id);
    let patch = match form.to_patch() {
        Ok(patch) => patch,
        Err(error) => {
            let notice = Notice::danger(ApplicationError::from(error).user_message());
            return render_form(
                &state,
                Some(&id),
                &form,
                Some(notice),
                StatusCode::UNPROCESSABLE_ENTITY,
            );
        }
    };
    if patch.is_empty() {
        return redirect_with("unchanged");
    }

    match state.catalog.update_partial(&id, patch).await {
        Ok(Some(product)) => {
            info!(event_name = "admin.product.updated", product_id = %product.id, "product updated");
            redirect_with("updated")
        }
        Ok(None) => redirect_with("not_found"),
        Err(error) => {
            error!(event_name = "admin.product.update_failed", product_id = %id, error = %error, "update failed");
            index_after_failure(&state, application_error(error)).await
        }
    }
}

pub async fn delete_product(
    State(state): State<AdminState>,
    Path(id): Path<String>,
) -> Response {
    let id = ProductId(id);
    match state.catalog.delete(&id).await {
        Ok(true) => {
            info!(event_name = "admin.product.deleted", product_id = %id, "product deleted");
            redirect_with("deleted")
        }
        Ok(false) => redirect_with("already_gone"),
        Err(error) => {
            error!(event_name = "admin.product.delete_failed", product_id = %id, error = %error, "delete failed");
            index_after_failure(&state, application_error(error)).await
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        extract::{Path, Query, State},
        http::{header::LOCATION, Request, StatusCode},
        response::Response,
        Form,
    };
    use rust_decimal::Decimal;
    use shopkeep_core::domain::product::{
        CatalogField, NewProduct, Product, ProductId, ProductPatch,
    };
    use shopkeep_db::{CatalogRepository, InMemoryCatalogRepository, RepositoryError};
    use tower::ServiceExt;

    use super::*;

    async fn seeded() -> (Arc<InMemoryCatalogRepository>, Product) {
        let catalog = Arc::new(InMemoryCatalogRepository::default());
        let product = catalog
            .create(NewProduct {
                name: "Keyboard".to_string(),
                price: Decimal::new(1_500, 0),
                stock: 200,
                category: "Accessories".to_string(),
            })
            .await
            .expect("seed");
        (catalog, product)
    }

    fn state(catalog: Arc<InMemoryCatalogRepository>) -> State<AdminState> {
        State(AdminState::new(catalog))
    }

    fn form(name: &str, price: &str, stock: &str, category: &str) -> Form<ProductForm> {
        Form(ProductForm {
            name: name.to_string(),
            price: price.to_string(),
            stock: stock.to_string(),
            category: category.to_string(),
        })
    }

    fn location(response: &Response) -> &str {
        response.headers().get(LOCATION).and_then(|v| v.to_str().ok()).unwrap_or_default()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), 1 << 20).await.expect("body");
        String::from_utf8(bytes.to_vec()).expect("utf8")
    }

    #[tokio::test]
    async fn index_lists_products_and_decodes_notice() {
        let (catalog, _) = seeded().await;

        let response = index_page(
            state(catalog),
            Query(NoticeQuery { notice: Some("created".to_string()) }),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("Keyboard"));
        assert!(html.contains("1500"));
        assert!(html.contains("Product created."));
    }

    #[tokio::test]
    async fn index_ignores_unknown_notice_codes() {
        let (catalog, _) = seeded().await;

        let response = index_page(
            state(catalog),
            Query(NoticeQuery { notice: Some("<script>".to_string()) }),
        )
        .await;

        let html = body_text(response).await;
        assert!(!html.contains("<script>"));
        assert!(!html.contains("role=\"status\""));
    }

    #[tokio::test]
    async fn create_redirects_and_stores_trimmed_product() {
        let catalog = Arc::new(InMemoryCatalogRepository::default());

        let response = create_product(
            state(catalog.clone()),
            form("  Dell XPS 15 ", "55000", "30", "Laptops"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin?notice=created");
        let stored = catalog.find_by_exact(CatalogField::Name, "Dell XPS 15").await.expect("find");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].price, Decimal::new(55_000, 0));
        assert_eq!(stored[0].stock, 30);
    }

    #[tokio::test]
    async fn create_with_unparseable_price_rerenders_form() {
        let catalog = Arc::new(InMemoryCatalogRepository::default());

        let response =
            create_product(state(catalog.clone()), form("Mouse", "cheap", "5", "Accessories"))
                .await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let html = body_text(response).await;
        assert!(html.contains("notice-danger"));
        assert!(html.contains("price `cheap` is not a number"));
        assert!(html.contains("value=\"Mouse\""));
        assert!(catalog.list_all().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn create_rejects_negative_price_and_negative_stock() {
        let catalog = Arc::new(InMemoryCatalogRepository::default());

        let price = create_product(state(catalog.clone()), form("Mouse", "-1", "5", "Accessories"))
            .await;
        let stock = create_product(state(catalog.clone()), form("Mouse", "10", "-5", "Accessories"))
            .await;

        assert_eq!(price.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(stock.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(catalog.list_all().await.expect("list").is_empty());
    }

    #[tokio::test]
    async fn create_rejects_blank_name() {
        let catalog = Arc::new(InMemoryCatalogRepository::default());

        let response =
            create_product(state(catalog), form("   ", "10", "1", "Accessories")).await;

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body_text(response).await.contains("name must not be blank"));
    }

    #[tokio::test]
    async fn edit_page_prefills_current_values() {
        let (catalog, product) = seeded().await;

        let response = edit_product_page(state(catalog), Path(product.id.0.clone())).await;

        assert_eq!(response.status(), StatusCode::OK);
        let html = body_text(response).await;
        assert!(html.contains("value=\"Keyboard\""));
        assert!(html.contains("Edit Keyboard"));
        assert!(html.contains("Blank fields keep their current value."));
    }

    #[tokio::test]
    async fn edit_page_for_unknown_id_redirects_with_notice() {
        let catalog = Arc::new(InMemoryCatalogRepository::default());

        let response = edit_product_page(state(catalog), Path("missing".to_string())).await;

        assert_eq!(location(&response), "/admin?notice=not_found");
    }

    #[tokio::test]
    async fn update_changes_only_filled_fields() {
        let (catalog, product) = seeded().await;

        let response =
            update_product(state(catalog.clone()), Path(product.id.0.clone()), form("", "", "150", ""))
                .await;

        assert_eq!(location(&response), "/admin?notice=updated");
        let stored = catalog.get(&product.id).await.expect("get").expect("exists");
        assert_eq!(stored.stock, 150);
        assert_eq!(stored.name, "Keyboard");
        assert_eq!(stored.price, Decimal::new(1_500, 0));
    }

    #[tokio::test]
    async fn update_with_nothing_filled_is_unchanged() {
        let (catalog, product) = seeded().await;

        let response =
            update_product(state(catalog), Path(product.id.0.clone()), form(" ", "", "", "")).await;

        assert_eq!(location(&response), "/admin?notice=unchanged");
    }

    #[tokio::test]
    async fn update_of_missing_product_redirects_with_notice() {
        let catalog = Arc::new(InMemoryCatalogRepository::default());

        let response =
            update_product(state(catalog), Path("missing".to_string()), form("X", "", "", "")).await;

        assert_eq!(location(&response), "/admin?notice=not_found");
    }

    #[tokio::test]
    async fn delete_of_missing_product_keeps_listing_intact() {
        let (catalog, product) = seeded().await;

        let response = delete_product(state(catalog.clone()), Path("missing".to_string())).await;

        assert_eq!(location(&response), "/admin?notice=already_gone");
        let listing = catalog.list_all().await.expect("list");
        assert_eq!(listing, vec![product]);
    }

    #[tokio::test]
    async fn delete_removes_product() {
        let (catalog, product) = seeded().await;

        let response = delete_product(state(catalog.clone()), Path(product.id.0.clone())).await;

        assert_eq!(location(&response), "/admin?notice=deleted");
        assert!(catalog.list_all().await.expect("list").is_empty());
    }

    struct UnavailableCatalog;

    #[async_trait]
    impl CatalogRepository for UnavailableCatalog {
        async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
            Err(RepositoryError::Database(sqlx::Error::PoolClosed))
        }

        async fn find_by_exact(
            &self,
            _field: CatalogField,
            _value: &str,
        ) -> Result<Vec<Product>, RepositoryError> {
            Err(RepositoryError::Database(sqlx::Error::PoolClosed))
        }

        async fn get(&self, _id: &ProductId) -> Result<Option<Product>, RepositoryError> {
            Err(RepositoryError::Database(sqlx::Error::PoolClosed))
        }

        async fn create(&self, _product: NewProduct) -> Result<Product, RepositoryError> {
            Err(RepositoryError::Database(sqlx::Error::PoolClosed))
        }

        async fn update_partial(
            &self,
            _id: &ProductId,
            _patch: ProductPatch,
        ) -> Result<Option<Product>, RepositoryError> {
            Err(RepositoryError::Database(sqlx::Error::PoolClosed))
        }

        async fn delete(&self, _id: &ProductId) -> Result<bool, RepositoryError> {
            Err(RepositoryError::Database(sqlx::Error::PoolClosed))
        }
    }

    #[tokio::test]
    async fn store_outage_renders_a_notice_instead_of_failing() {
        let state = State(AdminState::new(Arc::new(UnavailableCatalog)));

        let response = index_page(state, Query(NoticeQuery::default())).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(body_text(response).await.contains("The catalog store reported an error"));
    }

    #[tokio::test]
    async fn form_post_through_router_creates_product() {
        let catalog = Arc::new(InMemoryCatalogRepository::default());
        let app = router(catalog.clone());

        let request = Request::builder()
            .method("POST")
            .uri("/admin/products/new")
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from("name=iPhone+15&price=35000&stock=100&category=Smartphones"))
            .expect("request");
        let response = app.oneshot(request).await.expect("response");

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let stored = catalog.find_by_exact(CatalogField::Name, "iPhone 15").await.expect("find");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].category, "Smartphones");
    }
}
