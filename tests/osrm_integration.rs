//! OSRM table service against a real road network.
//!
//! Needs a prepared Colombia extract (MLD) in `OSRM_DATA_DIR`, e.g. built
//! with `osrm-extract`, `osrm-partition` and `osrm-customize` from the
//! Geofabrik `south-america/colombia` download. Run with
//! `cargo test -- --ignored`.

mod fixtures;

use std::env;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use testcontainers::core::{IntoContainerPort, Mount};
use testcontainers::runners::SyncRunner;
use testcontainers::{Container, GenericImage, ImageExt, ReuseDirective, TestcontainersError};

use bus_planner::haversine::haversine_km;
use bus_planner::osrm::{OsrmClient, OsrmConfig};
use bus_planner::{DistanceProvider, ProviderError};

use fixtures::{CENTRO, LAURELES, ORIGIN, POBLADO};

const DATASET: &str = "colombia-latest.osrm";

fn osrm_container() -> Result<(Container<GenericImage>, String), TestcontainersError> {
    let data_dir = PathBuf::from(env::var("OSRM_DATA_DIR").unwrap_or_else(|_| "osrm-data".to_string()));
    if !data_dir.join(format!("{DATASET}.partition")).exists() {
        return Err(TestcontainersError::other(format!(
            "no prepared dataset in {}",
            data_dir.display()
        )));
    }

    let image = GenericImage::new("osrm/osrm-backend", "latest")
        .with_exposed_port(5000.tcp())
        .with_mount(Mount::bind_mount(data_dir.to_string_lossy().to_string(), "/data"))
        .with_cmd(vec![
            "osrm-routed".to_string(),
            "--algorithm".to_string(),
            "mld".to_string(),
            format!("/data/{DATASET}"),
        ])
        .with_container_name("osrm-colombia-mld")
        .with_startup_timeout(Duration::from_secs(60))
        .with_reuse(ReuseDirective::Always);

    let container = image.start()?;
    let port = container.get_host_port_ipv4(5000.tcp())?;
    Ok((container, format!("http://127.0.0.1:{port}")))
}

#[test]
#[ignore = "needs Docker and a prepared OSRM dataset"]
fn osrm_table_returns_road_distances() {
    let (container, base_url) = osrm_container().expect("start OSRM container");
    let client = OsrmClient::new(OsrmConfig {
        base_url,
        ..OsrmConfig::default()
    })
    .expect("build OSRM client");

    let locations = vec![ORIGIN, POBLADO[1].coords(), LAURELES[0].coords(), CENTRO[0].coords()];

    // the router may still be loading right after start
    let started = Instant::now();
    let table = loop {
        match client.table_for(&locations) {
            Ok(table) => break table,
            Err(err @ (ProviderError::Unavailable(_) | ProviderError::Timeout))
                if started.elapsed() < Duration::from_secs(20) =>
            {
                eprintln!("OSRM not ready: {err}");
                std::thread::sleep(Duration::from_millis(500));
            }
            Err(err) => {
                if let Ok(stderr) = container.stderr_to_vec() {
                    eprintln!("OSRM stderr:\n{}", String::from_utf8_lossy(&stderr));
                }
                panic!("OSRM table failed: {err}");
            }
        }
    };

    assert_eq!(table.size(), locations.len());
    for i in 0..locations.len() {
        assert_eq!(table.km(i, i), 0.0);
        for j in 0..locations.len() {
            if i != j {
                // roads are never shorter than the great circle
                assert!(table.km(i, j) >= haversine_km(locations[i], locations[j]) * 0.95);
                assert!(table.durations_secs[i][j] > 0.0);
            }
        }
    }

    drop(container);
}
