use aerial_georef::aerial::{AerialImage, AerialSource};
use aerial_georef::config::georef::{self, GeorefToolConfig};
use aerial_georef::decode::{DecodeRequest, FileDecoder, Notify, PixmapLoader, RequestToken, WorkerPool};
use aerial_georef::diagnostics::{GeorefReport, InputDescriptor, ReportOutcome};
use aerial_georef::image::io::{save_grayscale_f32, save_rgba, write_json_file};
use aerial_georef::matching::OrthoMatcher;
use aerial_georef::raster::{Raster, RasterDataset, ReferenceRaster};
use aerial_georef::refine::Refiner;
use std::env;
use std::path::Path;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), String> {
    let config_path = env::args().nth(1).ok_or_else(usage)?;
    let config = georef::load_config(Path::new(&config_path))?;
    let start = Instant::now();

    let reference = open_reference(&config)?;
    let reference_desc = InputDescriptor {
        path: config.reference.image.display().to_string(),
        width: reference.image.w,
        height: reference.image.h,
        bands: 1,
    };
    let reference_gsd = reference.gsd();
    if let Some(dir) = &config.output.debug_dir {
        save_grayscale_f32(&reference.image, &dir.join("reference.png"))?;
    }

    let aerial = Raster::open(&config.aerial).map_err(|e| e.to_string())?;
    let aerial_desc = InputDescriptor {
        path: config.aerial.display().to_string(),
        width: aerial.width(),
        height: aerial.height(),
        bands: aerial.band_count(),
    };

    let matcher = OrthoMatcher::new(reference, config.matcher.clone());
    let refiner = Refiner::with_options(Arc::new(matcher), config.refine.clone());

    let id = config
        .aerial
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "aerial".to_string());
    let source = AerialSource::Image {
        width: aerial.width(),
        height: aerial.height(),
    };
    let mut image = match &config.placement.record {
        Some(record) => AerialImage::from_record(id, config.placement.meta, source, record)
            .map_err(|e| e.to_string())?,
        None => AerialImage::new(id, config.placement.meta, source),
    };
    let initial = image.native_to_world(aerial.width());

    let accept = config.placement.accept;
    let outcome = match image.georeference(&refiner, &aerial, |_| accept) {
        Ok(decision) => {
            let o = decision.outcome;
            println!(
                "{} homologous points, rmse {:.3}, shift {:.2}, scale {:.4} ({})",
                o.refined.point_count,
                o.refined.rmse,
                o.shift,
                o.scale_ratio,
                if decision.accepted { "accepted" } else { "rejected" }
            );
            ReportOutcome::Refined {
                result: o.refined,
                display_shift: o.shift,
                overlay: o.overlay,
            }
        }
        Err(err) => {
            println!("Georeferencing failed: {err}");
            ReportOutcome::failed(&err)
        }
    };

    if let Some(path) = &config.output.pixmap_out {
        decode_display_pixmap(&config, path)?;
    }

    let report = GeorefReport {
        aerial: aerial_desc,
        reference: reference_desc,
        reference_gsd,
        initial,
        outcome,
        total_ms: start.elapsed().as_secs_f64() * 1000.0,
    };
    if let Some(path) = &config.output.json_out {
        write_json_file(path, &report)?;
        println!("Saved report to {}", path.display());
    }
    if let Some(path) = &config.output.placement_out {
        write_json_file(path, &image.record())?;
        println!("Saved placement of {} to {}", image.id(), path.display());
    }
    Ok(())
}

fn open_reference(config: &GeorefToolConfig) -> Result<ReferenceRaster, String> {
    let path = &config.reference.image;
    let reference = match config.reference.geo {
        Some(geo) => {
            let raster = Raster::open(path).map_err(|e| e.to_string())?;
            ReferenceRaster::from_dataset(&raster, geo)
        }
        None => ReferenceRaster::open(path),
    };
    reference.map_err(|e| e.to_string())
}

fn decode_display_pixmap(config: &GeorefToolConfig, out: &Path) -> Result<(), String> {
    let pool = WorkerPool::new(config.decode.threads).map_err(|e| e.to_string())?;
    let (tx, rx) = mpsc::channel();
    let notify: Notify = Arc::new(move |token: RequestToken| {
        let _ = tx.send(token);
    });
    let loader = PixmapLoader::with_notify(Arc::new(pool), Arc::new(FileDecoder::default()), notify);
    let token = loader
        .request(DecodeRequest {
            path: config.aerial.clone(),
            preview: None,
            contrast: config.decode.contrast,
        })
        .ok_or("Decode request was not submitted")?;

    let timeout = Duration::from_secs_f64(config.decode.timeout_s.max(0.0));
    rx.recv_timeout(timeout)
        .map_err(|_| format!("No pixmap after {:.0} s", config.decode.timeout_s))?;
    let delivered = loader.take().ok_or("Pixmap slot is empty")?;
    debug_assert_eq!(delivered.token, token);
    save_rgba(&delivered.pixmap, out)?;
    println!(
        "Saved {}x{} pixmap to {}",
        delivered.pixmap.width,
        delivered.pixmap.height,
        out.display()
    );
    Ok(())
}

fn usage() -> String {
    "Usage: georef_demo <config.json>".to_string()
}
