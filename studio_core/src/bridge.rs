// JS bridge: a generation service backed by JS promise functions, a setTimeout
// timer, and the async export that runs one generation from the browser.
// JSON strings cross the boundary in both directions.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use js_sys::{Function, Promise, Reflect};
use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::error::{ServiceError, ServiceErrorKind, StudioError};
use crate::jobs::{CancellationToken, Generator};
use crate::service::{
    GenerationService, JobHandle, ServiceFuture, Timer, VideoArtifact, VideoConfig,
};
use crate::types::{ImagePayload, ProjectState, StudioConfig};

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_name = setTimeout)]
    fn set_timeout(handler: &Function, timeout_ms: i32) -> JsValue;
}

/// Timer backed by the browser's `setTimeout`.
pub struct BrowserTimer;

impl Timer for BrowserTimer {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + '_>> {
        let timeout_ms = duration.as_millis().min(i32::MAX as u128) as i32;
        let promise = Promise::new(&mut |resolve, _reject| {
            set_timeout(&resolve, timeout_ms);
        });
        Box::pin(async move {
            // setTimeout never rejects.
            let _ = JsFuture::from(promise).await;
        })
    }
}

/// Generation service implemented by a JS object.
///
/// The object must expose four functions, each taking JSON/string arguments
/// and returning a JSON string (or a promise of one):
///
/// ```js
/// {
///   transform(imageJson, directive)           // -> ImagePayload JSON
///   submitVideoJob(imageJson, directive, cfg) // -> JobHandle JSON
///   pollJob(handleJson)                       // -> JobHandle JSON
///   fetchArtifact(locator)                    // -> VideoArtifact JSON
/// }
/// ```
///
/// Rejections are classified from their message.
pub struct JsGenerationService {
    target: JsValue,
    transform: Function,
    submit_video_job: Function,
    poll_job: Function,
    fetch_artifact: Function,
}

impl JsGenerationService {
    pub fn from_js(target: JsValue) -> Result<Self, StudioError> {
        Ok(JsGenerationService {
            transform: method(&target, "transform")?,
            submit_video_job: method(&target, "submitVideoJob")?,
            poll_job: method(&target, "pollJob")?,
            fetch_artifact: method(&target, "fetchArtifact")?,
            target,
        })
    }

    async fn invoke<T: DeserializeOwned>(
        &self,
        function: &Function,
        args: &[JsValue],
    ) -> Result<T, ServiceError> {
        let returned = match args {
            [a] => function.call1(&self.target, a),
            [a, b] => function.call2(&self.target, a, b),
            [a, b, c] => function.call3(&self.target, a, b, c),
            _ => function.call0(&self.target),
        }
        .map_err(|e| ServiceError::classify(js_error_message(&e)))?;

        let settled = JsFuture::from(Promise::resolve(&returned))
            .await
            .map_err(|e| ServiceError::classify(js_error_message(&e)))?;

        let text = settled.as_string().ok_or_else(|| {
            ServiceError::new(ServiceErrorKind::Other, "service returned a non-string value")
        })?;
        serde_json::from_str(&text).map_err(|e| {
            ServiceError::new(
                ServiceErrorKind::Other,
                format!("unreadable service response: {}", e),
            )
        })
    }
}

impl GenerationService for JsGenerationService {
    fn transform<'a>(
        &'a self,
        image: &'a ImagePayload,
        directive: &'a str,
    ) -> ServiceFuture<'a, ImagePayload> {
        Box::pin(async move {
            let image = json_arg(image)?;
            self.invoke(&self.transform, &[image, JsValue::from_str(directive)])
                .await
        })
    }

    fn submit_video_job<'a>(
        &'a self,
        image: &'a ImagePayload,
        directive: &'a str,
        config: &'a VideoConfig,
    ) -> ServiceFuture<'a, JobHandle> {
        Box::pin(async move {
            let image = json_arg(image)?;
            let config = json_arg(config)?;
            self.invoke(
                &self.submit_video_job,
                &[image, JsValue::from_str(directive), config],
            )
            .await
        })
    }

    fn poll_job<'a>(&'a self, job: &'a JobHandle) -> ServiceFuture<'a, JobHandle> {
        Box::pin(async move {
            let job = json_arg(job)?;
            self.invoke(&self.poll_job, &[job]).await
        })
    }

    fn fetch_artifact<'a>(&'a self, locator: &'a str) -> ServiceFuture<'a, VideoArtifact> {
        Box::pin(async move {
            self.invoke(&self.fetch_artifact, &[JsValue::from_str(locator)])
                .await
        })
    }
}

fn method(target: &JsValue, name: &str) -> Result<Function, StudioError> {
    Reflect::get(target, &JsValue::from_str(name))
        .ok()
        .and_then(|value| value.dyn_into::<Function>().ok())
        .ok_or_else(|| {
            StudioError::InvalidConfig(format!("service object has no '{}' function", name))
        })
}

fn json_arg<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, ServiceError> {
    serde_json::to_string(value)
        .map(|text| JsValue::from_str(&text))
        .map_err(|e| ServiceError::new(ServiceErrorKind::MalformedInput, e.to_string()))
}

/// Best-effort message from a thrown JS value (string, Error, or anything else).
fn js_error_message(error: &JsValue) -> String {
    if let Some(text) = error.as_string() {
        return text;
    }
    Reflect::get(error, &JsValue::from_str("message"))
        .ok()
        .and_then(|message| message.as_string())
        .unwrap_or_else(|| format!("{:?}", error))
}

/// Cancels a token when an `AbortSignal` fires. Detaches its listener on drop.
struct AbortLink {
    signal: JsValue,
    listener: Closure<dyn FnMut()>,
}

impl AbortLink {
    fn attach(signal: JsValue, token: &CancellationToken) -> Option<AbortLink> {
        let aborted = Reflect::get(&signal, &JsValue::from_str("aborted"))
            .ok()
            .and_then(|value| value.as_bool())
            .unwrap_or(false);
        if aborted {
            token.cancel();
        }

        let add = method(&signal, "addEventListener").ok()?;
        let listener = Closure::<dyn FnMut()>::new({
            let token = token.clone();
            move || token.cancel()
        });
        add.call2(&signal, &JsValue::from_str("abort"), listener.as_ref())
            .ok()?;
        Some(AbortLink { signal, listener })
    }
}

impl Drop for AbortLink {
    fn drop(&mut self) {
        if let Ok(remove) = method(&self.signal, "removeEventListener") {
            let _ = remove.call2(
                &self.signal,
                &JsValue::from_str("abort"),
                self.listener.as_ref(),
            );
        }
    }
}

/// Run one generation for the given editor state.
///
/// # Arguments
/// * `service` - JS object implementing the generation service (see [`JsGenerationService`])
/// * `state_json` - Current `ProjectState` JSON (usually `Studio.current()`)
/// * `video_json` - `VideoConfig` JSON, used when the mode is `video`
/// * `config_json` - `StudioConfig` JSON (may be `{}`)
/// * `signal` - Optional `AbortSignal`; aborting stops polling
///
/// # Returns
/// `GeneratedAsset` JSON to commit with `Studio.add_asset()`.
#[wasm_bindgen]
pub async fn generate_asset(
    service: JsValue,
    state_json: String,
    video_json: String,
    config_json: String,
    signal: JsValue,
) -> Result<String, JsValue> {
    run_generation(service, &state_json, &video_json, &config_json, signal)
        .await
        .map_err(|e| JsValue::from_str(&user_facing(&e)))
}

async fn run_generation(
    service: JsValue,
    state_json: &str,
    video_json: &str,
    config_json: &str,
    signal: JsValue,
) -> Result<String, StudioError> {
    let state: ProjectState = serde_json::from_str(state_json)?;
    let video: VideoConfig = serde_json::from_str(video_json)?;
    let config: StudioConfig = serde_json::from_str(config_json)
        .map_err(|e| StudioError::InvalidConfig(e.to_string()))?;
    let service = JsGenerationService::from_js(service)?;

    let token = CancellationToken::new();
    let _abort = if signal.is_undefined() || signal.is_null() {
        None
    } else {
        AbortLink::attach(signal, &token)
    };

    let timer = BrowserTimer;
    let generator = Generator::new(&service, &timer, &config);
    let asset = generator.generate(&state, &video, Some(&token)).await?;
    Ok(serde_json::to_string(&asset)?)
}

/// Error text for the UI: the kind's explanation plus the raw detail.
fn user_facing(error: &StudioError) -> String {
    match error {
        StudioError::Service(e) => format!("{} ({})", e.user_message(), e.message),
        other => other.to_string(),
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Resolution;

    #[test]
    fn user_facing_service_error_includes_guidance() {
        let err = StudioError::Service(ServiceError::classify("429 quota exceeded"));
        let text = user_facing(&err);
        assert!(text.starts_with(ServiceErrorKind::Quota.user_message()));
        assert!(text.contains("429 quota exceeded"));
    }

    #[test]
    fn user_facing_other_errors_use_display() {
        let err = StudioError::QualityGate {
            actual: Resolution::new(640, 360),
            required: Resolution::new(1280, 720),
            attempts: 3,
        };
        assert_eq!(user_facing(&err), err.to_string());
    }
}
