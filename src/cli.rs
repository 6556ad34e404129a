// cli.rs — 命令行参数

use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use house_tour::TransitionKind;

#[derive(Parser, Debug)]
#[command(name = "house-tour")]
#[command(about = "Interactive 360° house tour viewer")]
pub struct Cli {
    /// Tour manifest (panoItems.json)
    pub manifest: Option<PathBuf>,
    /// Extra config.json applied before the manifest's own overrides
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Texture directory, defaults to the manifest's directory
    #[arg(long)]
    pub assets: Option<PathBuf>,
    /// View to open instead of the manifest's startPoint
    #[arg(long)]
    pub start: Option<String>,
    #[arg(long, value_enum)]
    pub transition: Option<TransitionArg>,
    #[arg(long, default_value_t = 1280)]
    pub width: u32,
    #[arg(long, default_value_t = 720)]
    pub height: u32,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionArg {
    None,
    Warp,
    Stretch,
}

impl From<TransitionArg> for TransitionKind {
    fn from(arg: TransitionArg) -> Self {
        match arg {
            TransitionArg::None => TransitionKind::None,
            TransitionArg::Warp => TransitionKind::Warp,
            TransitionArg::Stretch => TransitionKind::Stretch,
        }
    }
}

/// Options the loader thread needs; everything except the manifest path
/// survives opening a different manifest from the menu.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub config: Option<PathBuf>,
    pub assets: Option<PathBuf>,
    pub start: Option<String>,
    pub transition: Option<TransitionKind>,
}

impl Cli {
    pub fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config: self.config.clone(),
            assets: self.assets.clone(),
            start: self.start.clone(),
            transition: self.transition.map(Into::into),
        }
    }
}

impl LoadOptions {
    pub fn assets_for(&self, manifest: &Path) -> PathBuf {
        match &self.assets {
            Some(dir) => dir.clone(),
            None => manifest
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}
