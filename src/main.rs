//! Headless host for the COCO overlay plugin.
//!
//! Opens a COCO file through the plugin registry, drives the controls widget
//! from the command line and prints the resulting layers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use coco_overlay::config::ConfigManager;
use coco_overlay::utils::diagnose_coco_file;
use coco_overlay::{manifest, register, CocoWidget, DisplayToggle, LogLevel, VisualizationMode};
use coco_viewer::{LayerData, PluginRegistry, Viewer};

#[derive(Parser, Debug)]
#[command(name = "coco-overlay")]
#[command(about = "Show COCO annotations as viewer layers")]
struct Args {
    /// Path to a COCO annotations JSON file
    file: Option<PathBuf>,

    /// Image to show, 1-based as in the image list
    #[arg(short, long, default_value = "1")]
    image: usize,

    /// Only show these category ids (comma separated)
    #[arg(short, long, value_delimiter = ',')]
    categories: Option<Vec<u64>>,

    /// Maximum number of annotations to show
    #[arg(short, long)]
    n_filter: Option<usize>,

    /// Sampling seed for the N-filter
    #[arg(long)]
    seed: Option<u64>,

    /// Hide bounding boxes
    #[arg(long)]
    no_bbox: bool,

    /// Hide masks
    #[arg(long)]
    no_mask: bool,

    /// Masked mode: labels layer and cut-out image instead of shapes
    #[arg(long)]
    masked: bool,

    /// Print diagnostics for the file and exit
    #[arg(long)]
    diagnose: bool,

    /// Write the labels layer of masked mode to this .npy file
    #[arg(long)]
    labels_out: Option<PathBuf>,

    /// Print the plugin manifest as JSON and exit
    #[arg(long)]
    manifest: bool,

    /// Log level: error, warn, info, debug, trace
    #[arg(long)]
    log_level: Option<String>,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let config = ConfigManager::new().effective_config();

    let level = args
        .log_level
        .as_deref()
        .and_then(LogLevel::parse)
        .unwrap_or(config.log_level);
    env_logger::Builder::new()
        .filter_level(level.to_level_filter())
        .parse_default_env()
        .init();

    if args.manifest {
        return match serde_json::to_string_pretty(&manifest()) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to serialize manifest: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let Some(file) = args.file.clone() else {
        eprintln!("No COCO file given (see --help)");
        return ExitCode::FAILURE;
    };

    if args.diagnose {
        println!("{}", diagnose_coco_file(&file));
        return ExitCode::SUCCESS;
    }

    let mut registry = PluginRegistry::new();
    register(&mut registry);
    match registry.read(std::slice::from_ref(&file)) {
        Some(layers) => {
            println!("Reader: {} layer(s)", layers.len());
            for layer in &layers {
                println!("  {}", describe(layer));
            }
        }
        None => {
            eprintln!("No reader accepted {}", file.display());
            return ExitCode::FAILURE;
        }
    }

    let mut viewer = Viewer::new("coco-overlay");
    let mut widget = CocoWidget::new(config);
    if widget.on_file_selected(&mut viewer, &file).is_err() {
        eprintln!("{}", widget.state().status.text());
        return ExitCode::FAILURE;
    }
    drive_widget(&mut widget, &mut viewer, &args);

    println!("{}", widget.state().status.text());
    println!("Image: {}", current_entry(&widget));
    println!("Annotations {}", widget.state().annotation_count_label);
    println!("Viewer: {} layer(s)", viewer.layers.len());
    for (_, layer) in viewer.layers.iter() {
        println!("  {}", describe(layer));
    }

    if let Some(path) = &args.labels_out {
        let labels = viewer.layers.iter().find_map(|(_, layer)| layer.as_labels());
        match labels {
            Some(labels) => {
                if let Err(e) = ndarray_npy::write_npy(path, &labels.data) {
                    eprintln!("Failed to write {}: {}", path.display(), e);
                    return ExitCode::FAILURE;
                }
                println!("Wrote labels to {}", path.display());
            }
            None => {
                eprintln!("No labels layer to write (use --masked)");
                return ExitCode::FAILURE;
            }
        }
    }

    if widget.state().status.is_error() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn drive_widget(widget: &mut CocoWidget, viewer: &mut Viewer, args: &Args) {
    if args.masked {
        widget.on_visualization_mode_changed(viewer, VisualizationMode::Masked);
    }
    if let Some(index) = args.image.checked_sub(1) {
        if index != widget.navigation_controller().current_index() {
            widget.on_image_changed(viewer, index);
        }
    }
    if let Some(categories) = &args.categories {
        widget.select_none_categories(viewer);
        for &id in categories {
            widget.on_category_toggled(viewer, id, true);
        }
    }
    if let Some(seed) = args.seed {
        widget.on_seed_changed(viewer, seed);
    }
    if let Some(n) = args.n_filter {
        widget.on_n_filter_changed(viewer, n);
    }
    if args.no_bbox {
        widget.on_display_mode_changed(viewer, DisplayToggle::BoundingBoxes, false);
    }
    if args.no_mask {
        widget.on_display_mode_changed(viewer, DisplayToggle::Masks, false);
    }
}

fn current_entry(widget: &CocoWidget) -> String {
    let state = widget.state();
    state
        .image_entries
        .get(state.current_image_index)
        .cloned()
        .unwrap_or_else(|| "none".to_string())
}

fn describe(layer: &LayerData) -> String {
    match layer {
        LayerData::Shapes(shapes) => format!("{} [shapes] {} shape(s)", shapes.name, shapes.len()),
        LayerData::Labels(labels) => format!(
            "{} [labels] {}x{}, labels {:?}",
            labels.name,
            labels.data.nrows(),
            labels.data.ncols(),
            labels.labels()
        ),
        LayerData::Image(image) => format!(
            "{} [image] {}x{}x{}",
            image.name,
            image.height(),
            image.width(),
            image.channels()
        ),
    }
}
