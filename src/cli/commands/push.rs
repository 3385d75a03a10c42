//! Push command - push an unpacked image to a registry

use crate::cli::args::PushArgs;
use crate::config::Config;
use crate::error::{SkiffError, SkiffResult};
use crate::image::{Reference, UnpackedImage};
use crate::pusher::Pusher;
use crate::registry::HttpClient;
use crate::store::StoreLayout;
use crate::ui::{self, PushProgress, UiContext};
use tracing::debug;

/// Execute the push command
pub async fn execute(args: PushArgs, config: &Config) -> SkiffResult<()> {
    let ctx = UiContext::detect();

    let src_ref = Reference::parse(&args.source)?;
    let dst_ref = match args.dest {
        Some(ref dest) => Reference::parse(dest)?,
        None => src_ref.clone(),
    };

    // Fail fast before any work when the cache is asked for but the
    // subsystem is disabled in configuration.
    let cache_enabled = if args.cache {
        if !config.push.cache {
            return Err(SkiffError::CacheUnavailable);
        }
        true
    } else {
        false
    };

    let layout = StoreLayout::new(&config.storage.root);
    let image = UnpackedImage::open(src_ref.clone(), args.image.as_deref(), layout.root())?;

    ui::intro(&ctx, "Skiff Push");
    ui::key_value(&ctx, "image:", &src_ref.to_string());
    if args.image.is_some() {
        ui::key_value(&ctx, "image path:", &image.path.display().to_string());
    } else {
        debug!("Image path: {}", image.path.display());
    }
    ui::key_value(&ctx, "destination:", &dst_ref.to_string());

    let client = HttpClient::new(dst_ref.clone(), &config.registry)?
        .with_progress(PushProgress::new(&ctx));

    let pusher = Pusher::new(image, dst_ref.clone(), Box::new(client), layout, cache_enabled).await;
    match pusher.push().await {
        Ok(()) => {
            ui::outro_success(&ctx, &format!("Pushed {dst_ref}"));
            Ok(())
        }
        Err(e) => {
            ui::outro_error(&ctx, "Push failed");
            Err(e)
        }
    }
}
