//! xplane-obj CLI
//!
//! Export scene descriptions to X-Plane OBJ8 files and inspect existing ones.

use clap::{Parser, Subcommand, ValueEnum};
use xplane_obj::import::{ImportedObj, NodeKind};
use xplane_obj::registry::DatarefLookup;
use xplane_obj::{
    export_to_file, import_from_file, DatarefRegistry, Diagnostics, ExportConfig, ExportContext,
    ManipulatorRegistry, Platform, Scene, Severity,
};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xplane-obj")]
#[command(author, version, about = "Encode and decode X-Plane OBJ8 files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Export a JSON scene description to OBJ8
    Export {
        /// Input JSON scene
        #[arg(short, long)]
        scene: PathBuf,

        /// Output .obj path
        #[arg(short, long)]
        output: PathBuf,

        /// DataRefs.txt to resolve dataref names against
        #[arg(short, long)]
        datarefs: Option<PathBuf>,

        /// Force cockpit mode (otherwise taken from the output name)
        #[arg(long)]
        cockpit: bool,

        /// Platform marker on the first line
        #[arg(long, value_enum, default_value = "ibm")]
        platform: PlatformArg,

        /// Write the object name after each ANIM_begin
        #[arg(long)]
        debug_comments: bool,
    },

    /// Import an OBJ8 file and print its object tree
    Import {
        /// Input .obj file
        #[arg(short, long)]
        input: PathBuf,

        /// Also write the imported structure as JSON
        #[arg(short, long)]
        json: Option<PathBuf>,
    },

    /// Resolve dataref names against a DataRefs.txt
    Datarefs {
        /// Path to DataRefs.txt
        #[arg(short, long)]
        file: PathBuf,

        /// Short or leaf names to look up
        names: Vec<String>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum PlatformArg {
    Apple,
    Ibm,
}

impl From<PlatformArg> for Platform {
    fn from(value: PlatformArg) -> Self {
        match value {
            PlatformArg::Apple => Platform::Apple,
            PlatformArg::Ibm => Platform::Ibm,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Export {
            scene,
            output,
            datarefs,
            cockpit,
            platform,
            debug_comments,
        } => {
            export_scene(&scene, &output, datarefs.as_ref(), cockpit, platform, debug_comments)?;
        }
        Commands::Import { input, json } => {
            import_file(&input, json.as_ref())?;
        }
        Commands::Datarefs { file, names } => {
            lookup_datarefs(&file, &names)?;
        }
    }

    Ok(())
}

fn export_scene(
    scene_path: &PathBuf,
    output_path: &PathBuf,
    datarefs_path: Option<&PathBuf>,
    cockpit: bool,
    platform: PlatformArg,
    debug_comments: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Loading scene from {:?}...", scene_path);
    let scene = Scene::load_from_path(scene_path)?;
    println!("  Loaded {} objects", scene.objects.len());

    let datarefs = match datarefs_path {
        Some(path) => {
            let registry = DatarefRegistry::load_from_path(path)?;
            println!("  Loaded {} dataref names", registry.len());
            registry
        }
        None => DatarefRegistry::new(),
    };
    let manipulators = ManipulatorRegistry::builtin();
    let ctx = ExportContext::new(&datarefs, &manipulators);

    let mut config = ExportConfig::for_path(output_path)
        .with_platform(platform.into())
        .with_debug_comments(debug_comments);
    if cockpit {
        config = config.with_cockpit(true);
    }
    if config.cockpit {
        println!("  Cockpit mode");
    }

    let output = match export_to_file(output_path, &scene, &ctx, &config) {
        Ok(output) => output,
        Err(err) => {
            let objects = err.objects();
            if !objects.is_empty() {
                eprintln!("  Objects: {}", objects.join(", "));
            }
            return Err(err.into());
        }
    };

    print_diagnostics(&output.diagnostics);
    let stats = output.stats;
    println!(
        "Exported {} primitives to {:?}",
        stats.primitives, output_path
    );
    println!(
        "  {} vertices, {} line vertices, {} lights, {} indices, {} animations",
        stats.vertices, stats.line_vertices, stats.lights, stats.indices, stats.animations
    );
    Ok(())
}

fn import_file(
    input_path: &PathBuf,
    json_path: Option<&PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Importing {:?}...", input_path);
    let obj = import_from_file(input_path)?;

    if let Some(texture) = &obj.textures.diffuse {
        println!("  Texture: {}", texture);
    }
    for (index, node) in obj.nodes.iter().enumerate().filter(|(_, n)| n.parent.is_none()) {
        print_tree(&obj, index, node.name.as_str(), 1);
    }
    print_diagnostics(&obj.diagnostics);

    if let Some(json_path) = json_path {
        fs::write(json_path, serde_json::to_string_pretty(&obj)?)?;
        println!("Wrote {:?}", json_path);
    }
    Ok(())
}

fn print_tree(obj: &ImportedObj, index: usize, name: &str, depth: usize) {
    let node = &obj.nodes[index];
    let summary = match &node.kind {
        NodeKind::Empty => format!("{} animation(s)", node.animations.len()),
        NodeKind::Mesh { mesh, .. } => format!("{} faces", mesh.faces.len()),
        NodeKind::Lines { segments, .. } => format!("{} lines", segments.len()),
        NodeKind::Lights { lights } => format!("{} lights", lights.len()),
        NodeKind::Light(_) => "light".to_string(),
    };
    println!("{}{} ({})", "  ".repeat(depth), name, summary);
    for (child, node) in obj.nodes.iter().enumerate().filter(|(_, n)| n.parent == Some(index)) {
        print_tree(obj, child, &node.name, depth + 1);
    }
}

fn lookup_datarefs(file: &PathBuf, names: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let registry = DatarefRegistry::load_from_path(file)?;
    println!("Loaded {} dataref names", registry.len());
    for name in names {
        match registry.lookup(name) {
            DatarefLookup::Found(dataref) => {
                println!("  {} -> {} [{}]", name, dataref.path, dataref.array_len)
            }
            DatarefLookup::Ambiguous => println!("  {} is ambiguous", name),
            DatarefLookup::Unknown => println!("  {} is unknown", name),
        }
    }
    Ok(())
}

fn print_diagnostics(diagnostics: &Diagnostics) {
    for diagnostic in diagnostics.entries() {
        let label = match diagnostic.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
        };
        if diagnostic.objects.is_empty() {
            println!("  {}: {}", label, diagnostic.message);
        } else {
            println!(
                "  {}: {} ({})",
                label,
                diagnostic.message,
                diagnostic.objects.join(", ")
            );
        }
    }
}
