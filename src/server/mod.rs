pub mod http;

pub use http::{create_router, AnalysisRequest, HttpServer, QueryRequest, QueryResponse};
