use std::convert::Infallible;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::oneshot::{Receiver, Sender};

use hyper::{Body, Method, Request, Response, Server, StatusCode};
use hyper::service::{make_service_fn, service_fn};

use serde::{Deserialize, Serialize};

use log::{error, info};

use crate::catalog::{CatalogModel, Project, ProjectFilter};


#[derive(Serialize, Deserialize, Debug)]
pub enum ApiRequest {
    ProjectsAdd {projects: Vec<Project>, },
    ProjectsDel {ids: Vec<u64>, },

    // visible viewport, longitude/latitude edges
    Query {west: f64, south: f64, east: f64, north: f64, },

    Filter {
        #[serde(default)]
        district: Option<String>,
        #[serde(default, rename = "type")]
        kind: Option<String>,
        #[serde(default)]
        status: Option<String>,
    },
    Search {text: String, },
    All {},

    Clear {},
    Stats {},
}


#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub enum ApiResponse {
    Success { },
    Error { err: String, },
    ProjectsReply { projects: Vec<Project>, },
    AddReply { ids: Vec<u64>, },
    StatsReply { projects: usize, nodes: usize, leaves: usize, depth: usize, },
}


#[derive(Clone)]
pub struct ApiHandler {
    catalog: Arc<CatalogModel>,
}


impl ApiHandler {
    pub fn new(catalog: Arc<CatalogModel>) -> Self {
        Self {
            catalog
        }
    }


    async fn handle_request(&self, req: Request<Body>) -> Response<Body> {
        // reading the request body as bytes
        let api_response = match hyper::body::to_bytes(req.into_body()).await {
            Ok(body_bytes) => self.handle_body(&body_bytes),
            Err(err) => {
                error!("Api::error body reading - {err}");
                ApiResponse::Error { err: format!("Failed to read request body: {err}") }
            }
        };

        Self::serialize_response(&api_response)
    }


    /// Parses one JSON encoded `ApiRequest` and executes it.
    pub fn handle_body(&self, body_bytes: &[u8]) -> ApiResponse {
        // trying to deserialize it from json to an enum instance `ApiRequest`
        match serde_json::from_slice::<ApiRequest>(body_bytes) {
            Ok(api_request) => self.execute(api_request),

            // parsing failed, make a response that will include a description of the error
            Err(err) => {
                error!("Api::error request parsing - {err}");

                ApiResponse::Error { err: format!("Failed to parse request body: {err}") }
            }
        }
    }


    pub fn execute(&self, api_request: ApiRequest) -> ApiResponse {
        match api_request {
            ApiRequest::ProjectsAdd {projects}
                => self.handle_projects_add(projects),
            ApiRequest::ProjectsDel {ids}
                => self.handle_projects_del(&ids),

            ApiRequest::Query {west, south, east, north}
                => self.handle_query(west, south, east, north),

            ApiRequest::Filter {district, kind, status}
                => self.handle_filter(&ProjectFilter { district, kind, status }),
            ApiRequest::Search {text}
                => self.handle_search(&text),
            ApiRequest::All {}
                => self.handle_all(),

            ApiRequest::Clear {}
                => self.handle_clear(),
            ApiRequest::Stats {}
                => self.handle_stats(),
        }
    }


    fn serialize_response(response: &ApiResponse) -> Response<Body> {
        let (status, body) = match serde_json::to_string(response) {
            Ok(body) => (StatusCode::OK, body),
            Err(err) => {
                error!("Api::error response serialization - {err}");
                (StatusCode::INTERNAL_SERVER_ERROR, String::new())
            }
        };

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = status;
        response.headers_mut().insert(hyper::header::CONTENT_TYPE, hyper::header::HeaderValue::from_static("application/json"));
        response
    }

    // Handlers
    fn handle_projects_add(&self, projects: Vec<Project>) -> ApiResponse {
        info!("Api::projects_add {} projects", projects.len());
        match self.catalog.insert_projects(projects) {
            Ok(ids) => ApiResponse::AddReply { ids },
            Err(err) => ApiResponse::Error { err: err.to_string() },
        }
    }


    fn handle_projects_del(&self, ids: &[u64]) -> ApiResponse {
        info!("Api::projects_del {} projects", ids.len());
        self.catalog.delete_projects(ids);
        ApiResponse::Success {}
    }


    fn handle_query(&self, west: f64, south: f64, east: f64, north: f64) -> ApiResponse {
        info!("Api::query area: {west}, {south} - {east}, {north}");
        match self.catalog.query_viewport(west, south, east, north) {
            Ok(projects) => ApiResponse::ProjectsReply { projects },
            Err(err) => ApiResponse::Error { err: err.to_string() },
        }
    }


    fn handle_filter(&self, filter: &ProjectFilter) -> ApiResponse {
        info!("Api::filter {filter:?}");
        ApiResponse::ProjectsReply { projects: self.catalog.filter(filter) }
    }


    fn handle_search(&self, text: &str) -> ApiResponse {
        info!("Api::search \"{text}\"");
        ApiResponse::ProjectsReply { projects: self.catalog.search(text) }
    }


    fn handle_all(&self) -> ApiResponse {
        info!("Api::all");
        ApiResponse::ProjectsReply { projects: self.catalog.all() }
    }


    fn handle_clear(&self) -> ApiResponse {
        info!("Api::clear");
        self.catalog.clear();
        ApiResponse::Success {}
    }


    fn handle_stats(&self) -> ApiResponse {
        // one read of the catalog, every project has exactly one site in the tree
        let stats = self.catalog.stats();
        ApiResponse::StatsReply {
            projects: stats.points,
            nodes: stats.nodes,
            leaves: stats.leaves,
            depth: stats.depth,
        }
    }
}


pub async fn handle_request(api: Arc<ApiHandler>, req: Request<Body>) -> Result<Response<Body>, Infallible> {
    if req.method() == Method::POST && req.uri().path() == "/api/" {
        let api = api.as_ref();
        return Ok(api.handle_request(req).await);
    }

    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::NOT_FOUND;

    Ok(response)
}


async fn http_svc(catalog: Arc<CatalogModel>, listener: TcpListener, http_stop: Receiver<()>) {
    let api_handler = Arc::new(ApiHandler::new(catalog));

    let make_service = make_service_fn(move |_conn| {
        let api = api_handler.clone(); // clone the Arc reference
        let service = service_fn(move |req| {
            handle_request(api.clone(), req) // use the Arc reference
        });

        async move { Ok::<_, Infallible>(service) }
    });

    let server = match Server::from_tcp(listener) {
        Ok(builder) => builder.serve(make_service),
        Err(e) => {
            error!("cannot serve on the listener: {e}");
            return
        }
    };
    let addr = server.local_addr();

    let server = server.with_graceful_shutdown(async {
        http_stop.await.ok();
    });

    info!("Listening on http://{}", addr);
    if let Err(e) = server.await {
        error!("server error: {}", e);
    } else {
        info!("server stopped successfully")
    }
}

pub fn http_server_service(catalog: Arc<CatalogModel>, listener: TcpListener, http_stop: Receiver<()>) {
    // start http service in single thread runtime
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .thread_name("http_server_thread")
        .build();

    match rt {
        // block thread while service is running
        Ok(rt) => rt.block_on(http_svc(catalog, listener, http_stop)),
        Err(e) => error!("cannot start http runtime: {e}"),
    }
}


/// Handle to an HTTP service running on its own thread.
pub struct ServerControl {
    addr: SocketAddr,
    stop_signal: Sender<()>,
    handle: JoinHandle<()>,
}

impl ServerControl {
    /// Address the service actually listens on, useful when it was started on port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Asks the server to finish in-flight requests and waits for its thread.
    pub fn stop(self) {
        // the receiver is gone only when the server already ended on its own
        let _ = self.stop_signal.send(());
        if self.handle.join().is_err() {
            error!("http server thread panicked");
        }
    }
}

/// Binds `addr` and serves the catalog from a dedicated thread.
pub fn spawn_service(catalog: Arc<CatalogModel>, addr: SocketAddr) -> std::io::Result<ServerControl> {
    let listener = TcpListener::bind(addr)?;
    let addr = listener.local_addr()?;
    let (http_stop_tx, http_stop_rx) = tokio::sync::oneshot::channel::<()>();

    let handle = thread::Builder::new()
        .name("http_server".to_string())
        .spawn(move || {
            http_server_service(catalog, listener, http_stop_rx);
        })?;

    Ok(ServerControl {
        addr,
        stop_signal: http_stop_tx,
        handle,
    })
}
