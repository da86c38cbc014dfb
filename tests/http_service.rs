use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;

use project_map_lib::http::{spawn_service, ApiResponse};
use project_map_lib::{CatalogModel, IndexConfig};


const LIMA_PROJECTS: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/lima_projects.json");

// minimal HTTP/1.1 exchange, the server closes the connection after replying
fn post(addr: SocketAddr, path: &str, body: &str) -> (u16, String) {
    let mut stream = TcpStream::connect(addr).unwrap();
    write!(
        stream,
        "POST {path} HTTP/1.1\r\nHost: {addr}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    ).unwrap();

    let mut reply = String::new();
    stream.read_to_string(&mut reply).unwrap();

    let status = reply.split_whitespace().nth(1).unwrap().parse().unwrap();
    let body = reply.split_once("\r\n\r\n").map(|(_, body)| body.to_string()).unwrap_or_default();
    (status, body)
}

fn project_ids(body: &str) -> Vec<u64> {
    match serde_json::from_str::<ApiResponse>(body).unwrap() {
        ApiResponse::ProjectsReply { projects } => projects.iter().map(|p| p.id).collect(),
        other => panic!("unexpected response {other:?}"),
    }
}


#[test]
fn serves_catalog_over_http() {
    let catalog = Arc::new(CatalogModel::load(LIMA_PROJECTS, IndexConfig::default()).unwrap());
    let control = spawn_service(catalog.clone(), ([127, 0, 0, 1], 0).into()).unwrap();
    let addr = control.local_addr();

    let (status, body) = post(addr, "/api/", r#"{"Query": {"west": -77.04, "south": -12.10, "east": -77.02, "north": -12.09}}"#);
    assert_eq!(status, 200);
    assert_eq!(project_ids(&body), vec![1, 14, 17]);

    let (_, body) = post(addr, "/api/", r#"{"Search": {"text": "barranco"}}"#);
    assert_eq!(project_ids(&body), vec![6, 11, 16]);

    let (_, body) = post(addr, "/api/", r#"{"ProjectsDel": {"ids": [6]}}"#);
    assert_eq!(serde_json::from_str::<ApiResponse>(&body).unwrap(), ApiResponse::Success {});
    assert_eq!(catalog.len(), 19);

    let (_, body) = post(addr, "/api/", "{\"Nope\": {}}");
    assert!(matches!(serde_json::from_str::<ApiResponse>(&body).unwrap(), ApiResponse::Error { .. }));

    let (status, _) = post(addr, "/elsewhere", "{}");
    assert_eq!(status, 404);

    control.stop();
}
