use crate::gui_bridge::model::VisualizationModel;
use anyhow::{Context, Result};
use serde_json::json;
use std::{
    net::SocketAddr,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard},
    thread,
};
use tokio::runtime::Builder;
use warp::{http::StatusCode, Filter};

type SharedModel = Arc<RwLock<VisualizationModel>>;

fn read_model(state: &SharedModel) -> RwLockReadGuard<'_, VisualizationModel> {
    state.read().unwrap_or_else(PoisonError::into_inner)
}

/// Read-only routes over the published snapshot.
pub fn routes(
    state: SharedModel,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let state_filter = warp::any().map(move || state.clone());

    let summary_route = warp::path!("summary")
        .and(warp::get())
        .and(state_filter.clone())
        .map(|state: SharedModel| {
            let model = read_model(&state);
            match model.summary.as_ref() {
                Some(summary) => {
                    warp::reply::with_status(warp::reply::json(summary), StatusCode::OK)
                }
                None => warp::reply::with_status(
                    warp::reply::json(&json!({"error": "no recording processed yet"})),
                    StatusCode::SERVICE_UNAVAILABLE,
                ),
            }
        });

    let frames_route = warp::path!("frames")
        .and(warp::get())
        .and(state_filter.clone())
        .map(|state: SharedModel| warp::reply::json(&read_model(&state).frames));

    let frame_route = warp::path!("frames" / usize)
        .and(warp::get())
        .and(state_filter)
        .map(|index: usize, state: SharedModel| {
            let model = read_model(&state);
            match model.frame(index) {
                Some(frame) => warp::reply::with_status(warp::reply::json(frame), StatusCode::OK),
                None => warp::reply::with_status(
                    warp::reply::json(&json!({
                        "error": "frame out of range",
                        "frames": model.frames.len()
                    })),
                    StatusCode::NOT_FOUND,
                ),
            }
        });

    summary_route.or(frames_route).or(frame_route)
}

/// Bridge that holds the conditioned snapshot and serves it over HTTP.
pub struct GuiBridge {
    state: SharedModel,
}

impl GuiBridge {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(VisualizationModel::default())),
        }
    }

    /// Starts the HTTP endpoint on a background thread.
    pub fn serve(&self, address: SocketAddr) -> Result<()> {
        let routes = routes(self.state.clone());
        thread::Builder::new()
            .name("gui-bridge".into())
            .spawn(move || match Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime.block_on(warp::serve(routes).run(address)),
                Err(err) => log::error!("failed to build bridge runtime: {}", err),
            })
            .context("spawning bridge thread")?;
        log::info!("bridge listening on http://{}", address);
        Ok(())
    }

    pub fn publish(&self, model: VisualizationModel) {
        let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
        *guard = model;
        println!(
            "[GUI] frames: {}, laps: {}",
            guard.frames.len(),
            guard.summary.as_ref().map_or(0, |s| s.laps.len())
        );
    }

    pub fn publish_status(&self, message: &str) {
        println!("[GUI] {}", message);
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> VisualizationModel {
        read_model(&self.state).clone()
    }

    #[cfg(test)]
    fn state(&self) -> SharedModel {
        self.state.clone()
    }
}

impl Default for GuiBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::profile::{build_recording, GeneratorConfig};
    use crate::workflow::config::WorkflowConfig;
    use crate::workflow::runner::Runner;

    fn published_bridge() -> GuiBridge {
        let cfg = WorkflowConfig::from_args(5.0, 0.01, 1);
        let runner = Runner::new(cfg);
        let table = build_recording(&GeneratorConfig {
            laps: 1,
            ..Default::default()
        })
        .unwrap();
        let result = runner.execute(table).unwrap();
        let bridge = GuiBridge::new();
        bridge.publish(VisualizationModel::from_output(&result.output));
        bridge
    }

    #[test]
    fn gui_bridge_updates_state() {
        let bridge = published_bridge();
        let snapshot = bridge.snapshot();
        let summary = snapshot.summary.unwrap();
        assert_eq!(summary.row_count, snapshot.frames.len());
        assert_eq!(snapshot.stages.len(), 6);
    }

    #[tokio::test]
    async fn frame_route_serves_rows_by_index() {
        let bridge = published_bridge();
        let filter = routes(bridge.state());

        let response = warp::test::request()
            .method("GET")
            .path("/frames/0")
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let frame: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert!(frame.get("lap_time_s").is_some());

        let past_end = bridge.snapshot().frames.len();
        let response = warp::test::request()
            .method("GET")
            .path(&format!("/frames/{}", past_end))
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn summary_route_waits_for_first_publish() {
        let bridge = GuiBridge::new();
        let filter = routes(bridge.state());
        let response = warp::test::request()
            .path("/summary")
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        bridge.publish(published_bridge().snapshot());
        let response = warp::test::request()
            .path("/summary")
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let summary: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(summary["laps"].as_array().map(Vec::len), Some(1));
    }
}
