//! # Read Endpoint
//!
//! Serves every remote record as JSON, plus the map page's static files.

use std::sync::Arc;

use rocket::fs::FileServer;
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{get, routes, Build, Rocket, State};
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::model::RemoteRecord;
use crate::remote::RemoteStore;

type SharedRemote = Arc<dyn RemoteStore>;

/// GET /samples/all
///
/// Every record with its geometry as a GeoJSON point and its raw weather body.
#[get("/samples/all")]
async fn all_samples(store: &State<SharedRemote>) -> Result<Json<Vec<RemoteRecord>>, Status> {
    match store.select_all().await {
        Ok(records) => Ok(Json(records)),
        Err(e) => {
            error!("Error fetching all samples: {}", e);
            Err(Status::InternalServerError)
        }
    }
}

/// Assemble the web server without starting it
pub fn build(store: SharedRemote, config: &ServerConfig) -> Rocket<Build> {
    let figment = rocket::Config::figment()
        .merge(("address", config.address.clone()))
        .merge(("port", config.port));

    let mut rocket = rocket::custom(figment)
        .manage(store)
        .mount("/", routes![all_samples]);

    if config.static_dir.is_dir() {
        info!("Serving static files from {}", config.static_dir.display());
        rocket = rocket.mount("/", FileServer::from(&config.static_dir));
    } else {
        warn!(
            "Static directory {} not found, serving the API only",
            config.static_dir.display()
        );
    }

    rocket
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SurveyError;
    use crate::model::GeoPoint;
    use crate::remote::mocks::InMemoryRemoteStore;
    use crate::remote::MockRemoteStore;
    use chrono::{TimeZone, Utc};
    use rocket::local::asynchronous::Client;
    use std::path::PathBuf;

    fn config(static_dir: PathBuf) -> ServerConfig {
        ServerConfig {
            address: "127.0.0.1".to_string(),
            port: 4001,
            static_dir,
        }
    }

    #[tokio::test]
    async fn test_all_samples_returns_every_record() {
        let remote = Arc::new(InMemoryRemoteStore::new());
        remote.insert(RemoteRecord {
            id: 1,
            altitude: 545.4,
            signal_quality: "15,99".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap(),
            weather: Some("{\"currently\":{}}".to_string()),
            geom: GeoPoint::new(11.5167, 48.1173),
        });
        remote.insert(RemoteRecord {
            id: 2,
            altitude: 12.0,
            signal_quality: "9,99".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 13, 0, 0).unwrap(),
            weather: None,
            geom: GeoPoint::new(11.6, 48.2),
        });

        let client = Client::tracked(build(remote, &config(PathBuf::from("/nonexistent"))))
            .await
            .unwrap();
        let response = client.get("/samples/all").dispatch().await;

        assert_eq!(response.status(), Status::Ok);
        let body: serde_json::Value = response.into_json().await.unwrap();
        let rows = body.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["id"], 1);
        assert_eq!(rows[0]["alt"], 545.4);
        assert_eq!(rows[0]["csq"], "15,99");
        assert_eq!(rows[0]["geom"]["type"], "Point");
        assert_eq!(rows[0]["geom"]["coordinates"][0], 11.5167);
        assert!(rows[1]["weather"].is_null());
    }

    #[tokio::test]
    async fn test_store_failure_is_500() {
        let mut remote = MockRemoteStore::new();
        remote
            .expect_select_all()
            .returning(|| Err(SurveyError::StoreWrite("connection refused".to_string())));

        let client = Client::tracked(build(Arc::new(remote), &config(PathBuf::from("/nonexistent"))))
            .await
            .unwrap();
        let response = client.get("/samples/all").dispatch().await;

        assert_eq!(response.status(), Status::InternalServerError);
    }

    #[tokio::test]
    async fn test_serves_static_files_when_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>map</html>").unwrap();

        let remote = Arc::new(InMemoryRemoteStore::new());
        let client = Client::tracked(build(remote, &config(dir.path().to_path_buf())))
            .await
            .unwrap();

        let response = client.get("/index.html").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.into_string().await.unwrap(), "<html>map</html>");

        let response = client.get("/samples/all").dispatch().await;
        assert_eq!(response.status(), Status::Ok);
    }
}
