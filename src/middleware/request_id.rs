use axum::body::Body;
use axum::extract::Request;
use axum::http::header;
use axum::response::Response;
use http_body_util::BodyExt;

/// Attach a request id to every request: reuse a valid client-supplied
/// `x-request-id`, otherwise generate one. The id is logged with the
/// request span, echoed in the response header, and injected as `traceId`
/// into JSON error bodies.
pub async fn request_id_middleware(req: Request, next: axum::middleware::Next) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .filter(|s| is_valid_request_id(s))
        .map(|s| s.to_string())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let span = tracing::info_span!("request", request_id = %request_id);

    let mut response = {
        let _guard = span.enter();
        let method = req.method().clone();
        let uri = req.uri().clone();

        let start = std::time::Instant::now();
        let response = next.run(req).await;
        let latency_ms = start.elapsed().as_millis();

        tracing::info!(
            method = %method,
            path = %uri.path(),
            status = %response.status().as_u16(),
            latency_ms = %latency_ms,
            "request completed"
        );

        response
    };

    if let Ok(value) = request_id.parse() {
        response.headers_mut().insert("x-request-id", value);
    }

    if !response.status().is_success() && is_json_content_type(&response) {
        inject_trace_id(response, &request_id).await
    } else {
        response
    }
}

fn is_json_content_type(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("application/json"))
        .unwrap_or(false)
}

async fn inject_trace_id(response: Response, request_id: &str) -> Response {
    let (parts, body) = response.into_parts();

    let Ok(collected) = body.collect().await else {
        return Response::from_parts(parts, Body::empty());
    };
    let original = collected.to_bytes();

    // 非对象或已损坏的 JSON 原样返回
    let rewritten = serde_json::from_slice::<serde_json::Value>(&original)
        .ok()
        .and_then(|mut json| {
            json.as_object_mut()?
                .insert("traceId".to_string(), request_id.into());
            serde_json::to_vec(&json).ok()
        })
        .unwrap_or_else(|| original.to_vec());

    Response::from_parts(parts, Body::from(rewritten))
}

/// 校验客户端提供的 x-request-id：长度不超过 128 字符，仅允许字母数字、连字符和下划线
fn is_valid_request_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= 128
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
