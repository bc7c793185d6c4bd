use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::{json, Value};

use atelier_core::RuntimeError;

use crate::net::guarded_fetch_bytes;
use crate::node::{error_output, Node, NodeContext, NodeOutputs};

/// Loads an image and republishes it as base64.
///
/// The `Source` parameter selects where the image comes from: `upload`
/// (base64 carried in the node value), `url` (SSRF-guarded fetch), or
/// `base64` (first input socket, data-URL prefix tolerated). Outputs the
/// base64 payload and an info object.
pub struct ImageInputNode;

fn strip_data_url(data: &str) -> (&str, Option<&str>) {
    if let Some(rest) = data.strip_prefix("data:") {
        if let Some((meta, payload)) = rest.split_once(",") {
            let mime = meta.split(';').next().filter(|m| !m.is_empty());
            return (payload, mime);
        }
    }
    (data, None)
}

#[async_trait]
impl Node for ImageInputNode {
    fn node_type(&self) -> &'static str {
        "image_input"
    }

    async fn process(&self, ctx: &NodeContext<'_>) -> Result<NodeOutputs, RuntimeError> {
        let source = ctx.param_str("Source").unwrap_or_else(|| "upload".to_string());

        let (base64_data, mime, origin) = match source.as_str() {
            "upload" => {
                let raw = ctx
                    .spec
                    .node_value
                    .as_ref()
                    .map(atelier_core::stringify)
                    .unwrap_or_default();
                if raw.is_empty() {
                    return Ok(error_output(ctx, "no uploaded image on node"));
                }
                let (payload, mime) = strip_data_url(&raw);
                (payload.to_string(), mime.map(String::from), "upload".to_string())
            }
            "url" => {
                let Some(url) = ctx.input_str(0).filter(|s| !s.is_empty()).or_else(|| ctx.param_str("URL")) else {
                    return Ok(error_output(ctx, "no image URL provided"));
                };
                match guarded_fetch_bytes(&url).await {
                    Ok((bytes, content_type)) => {
                        (BASE64.encode(&bytes), Some(content_type), url)
                    }
                    Err(e) => return Ok(error_output(ctx, e)),
                }
            }
            "base64" => {
                let Some(raw) = ctx.input_str(0) else {
                    return Ok(error_output(ctx, "no base64 input provided"));
                };
                let (payload, mime) = strip_data_url(&raw);
                (payload.to_string(), mime.map(String::from), "input".to_string())
            }
            other => return Ok(error_output(ctx, format!("unknown source '{other}'"))),
        };

        if BASE64.decode(base64_data.trim()).is_err() {
            return Ok(error_output(ctx, "payload is not valid base64"));
        }

        let info = json!({
            "source": origin,
            "mimeType": mime.unwrap_or_else(|| "image/png".to_string()),
            "bytes": base64_data.len() * 3 / 4,
        });

        Ok(ctx.pair_output(Value::String(base64_data), info))
    }
}
