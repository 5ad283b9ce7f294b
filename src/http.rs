//! HTTP API for the registry
//!
//! Thin glue over the service layer:
//!
//! ## Directory
//! - `POST /principals` - Register a principal (admin)
//! - `GET  /principals` - List principals (admin)
//! - `GET  /principals/{id}` - Get a principal
//! - `POST /principals/{id}/role` - Change role (admin)
//! - `POST /principals/{id}/active` - Enable/disable (admin)
//! - `POST /units` - Create a unit (admin)
//! - `GET  /units`, `GET /units/{id}` - Read units
//! - `POST /units/{id}/staff` - Assign aamil/coordinator (admin)
//!
//! ## Content
//! - `POST /content` - Create content
//! - `GET  /content` - List visible content
//! - `GET  /content/{id}` / `PUT` / `DELETE` - Item operations
//!
//! ## Surveys
//! - `POST /surveys` - Create a survey
//! - `GET  /surveys`, `GET /surveys/{id}` - Read surveys
//! - `POST /surveys/{id}/responses` - Submit a response
//! - `GET  /surveys/{id}/responses` - Raw responses (writers)
//! - `POST /surveys/{id}/invited` - Set invitation count (writers)
//! - `GET  /surveys/{id}/analytics` - Analytics snapshot (writers)
//! - `GET  /surveys/{id}/analytics.csv` - CSV export (writers)
//!
//! ## Petitions
//! - `POST /petitions`, `GET /petitions`, `GET /petitions/{id}`
//! - `POST /petitions/{id}/status` - Review transition (writers)
//!
//! Caller identity travels in the `X-Principal-Id` header; a missing
//! header is the anonymous principal.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::db::{content, petitions, principals, surveys, units, RegistryDb};
use crate::error::RegistryError;
use crate::services::{self, response, Services};
use crate::visibility::Principal;

/// Header carrying the caller's principal id
pub const PRINCIPAL_HEADER: &str = "x-principal-id";

/// Paging parameters shared by list endpoints
#[derive(Debug, Deserialize)]
struct PageQuery {
    #[serde(default = "default_page_limit")]
    limit: u32,
    #[serde(default)]
    offset: u32,
}

fn default_page_limit() -> u32 {
    100
}

/// Analytics query parameters
#[derive(Debug, Default, Deserialize)]
struct AnalyticsQuery {
    #[serde(default)]
    invited: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RoleBody {
    role: String,
}

#[derive(Debug, Deserialize)]
struct ActiveBody {
    active: bool,
}

#[derive(Debug, Deserialize)]
struct StaffBody {
    #[serde(default)]
    aamil_id: Option<String>,
    #[serde(default)]
    coordinator_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusBody {
    status: String,
}

#[derive(Debug, Deserialize)]
struct InvitedBody {
    invited_count: Option<i64>,
}

/// HTTP server state
pub struct HttpServer {
    services: Arc<Services>,
    db: Arc<RegistryDb>,
    bind_addr: SocketAddr,
    max_page_size: u32,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(services: Arc<Services>, db: Arc<RegistryDb>, bind_addr: SocketAddr) -> Self {
        Self {
            services,
            db,
            bind_addr,
            max_page_size: 500,
        }
    }

    /// Cap the page size list endpoints will serve
    pub fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    /// Run the HTTP server
    pub async fn run(self: Arc<Self>) -> Result<(), RegistryError> {
        let listener = TcpListener::bind(self.bind_addr).await?;
        info!(addr = %self.bind_addr, "HTTP server listening");

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let server = self.clone();

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let server = server.clone();
                    async move { server.handle_request(req).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    warn!(addr = %remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    /// Route requests to handlers
    async fn handle_request(
        &self,
        req: Request<Incoming>,
    ) -> Result<Response<Full<Bytes>>, hyper::Error> {
        let path = req.uri().path().to_string();
        let method = req.method().clone();

        debug!(method = %method, path = %path, "Incoming request");

        let principal = match self.resolve_principal(&req) {
            Ok(p) => p,
            Err(e) => return Ok(response::error_response(e)),
        };

        let segments: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect();
        let parts: Vec<&str> = segments.iter().map(|s| s.as_str()).collect();

        let resp = match (method, parts.as_slice()) {
            (Method::GET, ["health"]) => self.handle_health(),

            // Directory
            (Method::POST, ["principals"]) => {
                match read_json::<principals::CreatePrincipalInput>(req).await {
                    Ok(input) => response::from_create_result(
                        self.services.directory.create_principal(&principal, input),
                    ),
                    Err(e) => response::error_response(e),
                }
            }
            (Method::GET, ["principals"]) => {
                let (limit, offset) = match self.page(&path, req.uri().query()) {
                    Ok(p) => p,
                    Err(e) => return Ok(response::error_response(e)),
                };
                response::from_result(
                    self.services
                        .directory
                        .list_principals(&principal, limit, offset),
                )
            }
            (Method::GET, ["principals", id]) => {
                response::from_result(self.services.directory.get_principal(id))
            }
            (Method::POST, ["principals", id, "role"]) => {
                let id = id.to_string();
                match read_json::<RoleBody>(req).await {
                    Ok(body) => response::from_result(
                        self.services.directory.set_role(&principal, &id, &body.role),
                    ),
                    Err(e) => response::error_response(e),
                }
            }
            (Method::POST, ["principals", id, "active"]) => {
                let id = id.to_string();
                match read_json::<ActiveBody>(req).await {
                    Ok(body) => response::from_result(
                        self.services
                            .directory
                            .set_active(&principal, &id, body.active),
                    ),
                    Err(e) => response::error_response(e),
                }
            }

            (Method::POST, ["units"]) => match read_json::<units::CreateUnitInput>(req).await {
                Ok(input) => response::from_create_result(
                    self.services.directory.create_unit(&principal, input),
                ),
                Err(e) => response::error_response(e),
            },
            (Method::GET, ["units"]) => {
                let (limit, offset) = match self.page(&path, req.uri().query()) {
                    Ok(p) => p,
                    Err(e) => return Ok(response::error_response(e)),
                };
                response::from_result(self.services.directory.list_units(limit, offset))
            }
            (Method::GET, ["units", id]) => {
                response::from_result(self.services.directory.get_unit(id))
            }
            (Method::POST, ["units", id, "staff"]) => {
                let id = id.to_string();
                match read_json::<StaffBody>(req).await {
                    Ok(body) => response::from_result(self.services.directory.assign_staff(
                        &principal,
                        &id,
                        body.aamil_id.as_deref(),
                        body.coordinator_id.as_deref(),
                    )),
                    Err(e) => response::error_response(e),
                }
            }

            // Content
            (Method::POST, ["content"]) => {
                match read_json::<content::CreateContentInput>(req).await {
                    Ok(input) => response::from_create_result(
                        self.services.content.create(&principal, input),
                    ),
                    Err(e) => response::error_response(e),
                }
            }
            (Method::GET, ["content"]) => {
                match parse_query::<content::ContentQuery>(req.uri().query()) {
                    Ok(mut query) => {
                        query.limit = query.limit.min(self.max_page_size);
                        response::from_result(self.services.content.list(&principal, &query))
                    }
                    Err(e) => response::error_response(e),
                }
            }
            (Method::GET, ["content", id]) => {
                response::from_result(self.services.content.get(&principal, id))
            }
            (Method::PUT, ["content", id]) => {
                let id = id.to_string();
                match read_json::<services::UpdateContentInput>(req).await {
                    Ok(input) => response::from_result(
                        self.services.content.update(&principal, &id, input),
                    ),
                    Err(e) => response::error_response(e),
                }
            }
            (Method::DELETE, ["content", id]) => response::from_delete_bool_result(
                self.services.content.delete(&principal, id),
                "content not found",
            ),

            // Surveys
            (Method::POST, ["surveys"]) => {
                match read_json::<surveys::CreateSurveyInput>(req).await {
                    Ok(input) => response::from_create_result(
                        self.services.survey.create(&principal, input),
                    ),
                    Err(e) => response::error_response(e),
                }
            }
            (Method::GET, ["surveys"]) => {
                let (limit, offset) = match self.page(&path, req.uri().query()) {
                    Ok(p) => p,
                    Err(e) => return Ok(response::error_response(e)),
                };
                response::from_result(self.services.survey.list(&principal, limit, offset))
            }
            (Method::GET, ["surveys", id]) => {
                response::from_result(self.services.survey.get(&principal, id))
            }
            (Method::POST, ["surveys", id, "responses"]) => {
                let id = id.to_string();
                match read_json::<services::SubmitResponseInput>(req).await {
                    Ok(input) => response::from_create_result(
                        self.services.survey.submit_response(&principal, &id, input),
                    ),
                    Err(e) => response::error_response(e),
                }
            }
            (Method::GET, ["surveys", id, "responses"]) => {
                response::from_result(self.services.survey.list_responses(&principal, id))
            }
            (Method::POST, ["surveys", id, "invited"]) => {
                let id = id.to_string();
                match read_json::<InvitedBody>(req).await {
                    Ok(body) => response::from_result(self.services.survey.set_invited_count(
                        &principal,
                        &id,
                        body.invited_count,
                    )),
                    Err(e) => response::error_response(e),
                }
            }
            (Method::GET, ["surveys", id, "analytics"]) => {
                match parse_query::<AnalyticsQuery>(req.uri().query()) {
                    Ok(query) => response::from_result(self.services.survey.analytics(
                        &principal,
                        id,
                        query.invited,
                    )),
                    Err(e) => response::error_response(e),
                }
            }
            (Method::GET, ["surveys", id, "analytics.csv"]) => {
                match parse_query::<AnalyticsQuery>(req.uri().query()) {
                    Ok(query) => {
                        match self
                            .services
                            .survey
                            .analytics_csv(&principal, id, query.invited)
                        {
                            Ok(csv) => response::csv_response(csv),
                            Err(e) => response::error_response(e),
                        }
                    }
                    Err(e) => response::error_response(e),
                }
            }

            // Petitions
            (Method::POST, ["petitions"]) => {
                match read_json::<petitions::CreatePetitionInput>(req).await {
                    Ok(input) => response::from_create_result(
                        self.services.petition.create(&principal, input),
                    ),
                    Err(e) => response::error_response(e),
                }
            }
            (Method::GET, ["petitions"]) => {
                let (limit, offset) = match self.page(&path, req.uri().query()) {
                    Ok(p) => p,
                    Err(e) => return Ok(response::error_response(e)),
                };
                response::from_result(self.services.petition.list(&principal, limit, offset))
            }
            (Method::GET, ["petitions", id]) => {
                response::from_result(self.services.petition.get(&principal, id))
            }
            (Method::POST, ["petitions", id, "status"]) => {
                let id = id.to_string();
                match read_json::<StatusBody>(req).await {
                    Ok(body) => response::from_result(self.services.petition.set_status(
                        &principal,
                        &id,
                        &body.status,
                    )),
                    Err(e) => response::error_response(e),
                }
            }

            (Method::GET | Method::POST | Method::PUT | Method::DELETE, _) => {
                response::not_found("no such route")
            }
            _ => response::method_not_allowed(),
        };

        Ok(resp)
    }

    /// Health check endpoint
    fn handle_health(&self) -> Response<Full<Bytes>> {
        match self.db.stats() {
            Ok(stats) => response::ok(&serde_json::json!({
                "status": "ok",
                "principals": stats.principal_count,
                "units": stats.unit_count,
                "content": stats.content_count,
                "surveys": stats.survey_count,
                "responses": stats.response_count,
                "petitions": stats.petition_count,
            })),
            Err(e) => response::error_response(e),
        }
    }

    /// Resolve the caller's principal from the identity header
    fn resolve_principal(&self, req: &Request<Incoming>) -> Result<Principal, RegistryError> {
        let header = req
            .headers()
            .get(PRINCIPAL_HEADER)
            .map(|v| {
                v.to_str()
                    .map_err(|_| RegistryError::Auth("invalid principal header".into()))
            })
            .transpose()?;

        self.services.directory.resolve(header)
    }

    /// Parse and clamp paging parameters
    fn page(&self, path: &str, query: Option<&str>) -> Result<(u32, u32), RegistryError> {
        let page: PageQuery = parse_query(query)
            .map_err(|e| RegistryError::InvalidInput(format!("{} query: {}", path, e)))?;
        Ok((page.limit.min(self.max_page_size), page.offset))
    }
}

/// Read and deserialize a JSON request body
async fn read_json<T: DeserializeOwned>(req: Request<Incoming>) -> Result<T, RegistryError> {
    let body = req
        .collect()
        .await
        .map_err(|e| RegistryError::Internal(format!("Failed to read body: {}", e)))?;
    let bytes = body.to_bytes();

    serde_json::from_slice(&bytes).map_err(RegistryError::from)
}

/// Parse a query string into a typed struct
fn parse_query<T: DeserializeOwned>(query: Option<&str>) -> Result<T, RegistryError> {
    serde_urlencoded::from_str(query.unwrap_or(""))
        .map_err(|e| RegistryError::InvalidInput(format!("invalid query: {}", e)))
}
