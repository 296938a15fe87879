use bytes::Bytes;
use flate2::Compression;
use flate2::write::GzEncoder;
use http::header::{CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE};
use http::{HeaderMap, HeaderValue};
use http_body_util::Full;
use micro_body::{Options, ParsedBody, parse};
use std::io::Write;
use tracing::{Level, error, info};
use tracing_subscriber::FmtSubscriber;

fn headers(content_type: &'static str, length: Option<usize>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    if let Some(length) = length {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    }
    headers
}

async fn show(name: &str, body: Bytes, headers: HeaderMap, options: &Options) {
    match parse(Full::new(body), &headers, options).await {
        Ok(ParsedBody::Text(text)) => info!(name, %text, "parsed text"),
        Ok(ParsedBody::Json(value)) => info!(name, %value, "parsed json"),
        Ok(ParsedBody::Form(form)) => info!(name, ?form, "parsed form"),
        Err(e) => error!(name, status = %e.status(), cause = %e, "failed to parse body"),
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::DEBUG).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let options = Options::new();

    let json = Bytes::from_static(br#"{"hello":"world"}"#);
    show("json", json.clone(), headers("application/json", Some(json.len())), &options).await;

    let form = Bytes::from_static(b"name=zava&tag=a&tag=b");
    show("form", form.clone(), headers("application/x-www-form-urlencoded", Some(form.len())), &options).await;

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(b"hello world").expect("gzip in memory");
    let mut gzip_headers = headers("text/plain; charset=utf-8", None);
    gzip_headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
    show("gzip", Bytes::from(encoder.finish().expect("gzip in memory")), gzip_headers, &options).await;

    let primitive = Bytes::from_static(br#""test""#);
    show("primitive", primitive.clone(), headers("application/json", Some(primitive.len())), &options).await;

    show("unknown", Bytes::new(), headers("foo/bar", Some(0)), &options).await;

    let large = Bytes::from(vec![b'a'; 64]);
    show("too large", large, headers("text/plain", Some(64)), &Options::new().limit(16)).await;
}
