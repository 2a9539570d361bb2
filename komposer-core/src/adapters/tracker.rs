//! Tracker Adapter
//!
//! Runs the loader inside an [`Autorun`], so the container reloads whenever a
//! [`Signal`](crate::reactive::Signal) the loader read changes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::warn;

use crate::compose::{compose, Composer};
use crate::container::ResultCallback;
use crate::error::ComposeError;
use crate::loader::{LoadResult, Stop};
use crate::options::{ComposeOptions, Context};
use crate::props::Props;
use crate::reactive::{Autorun, Cleanup, ReactiveContext};

/// Compose with a reactive loader.
///
/// `f` runs once per subscription and again after any signal it read
/// changes. A stop it returns is called before the next run and when the
/// subscription ends.
pub fn compose_with_tracker<F>(f: F, options: ComposeOptions) -> Composer
where
    F: Fn(&Props, &ResultCallback, &Context) -> LoadResult + Send + Sync + 'static,
{
    let f = Arc::new(f);

    compose(
        move |props: &Props, callback: ResultCallback, context: &Context| {
            // Errors of the first run fail the subscription; later ones are logged.
            let first_error: Arc<Mutex<Option<ComposeError>>> = Arc::default();

            let run = {
                let f = Arc::clone(&f);
                let first_error = Arc::clone(&first_error);
                let props = props.clone();
                let context = context.clone();
                let started = AtomicBool::new(false);
                move || -> Option<Cleanup> {
                    let initial = !started.swap(true, Ordering::SeqCst);
                    match f(&props, &callback, &context) {
                        Ok(stop) => stop.map(|stop| Box::new(move || stop.stop()) as Cleanup),
                        Err(err) if initial => {
                            *first_error.lock() = Some(err);
                            None
                        }
                        Err(err) => {
                            warn!(
                                container = %callback.container_name(),
                                error = %err,
                                "tracker rerun failed"
                            );
                            None
                        }
                    }
                }
            };

            let autorun = ReactiveContext::untracked(|| Autorun::with_cleanup(run));
            let failed = first_error.lock().take();
            if let Some(err) = failed {
                autorun.stop();
                return Err(err);
            }

            Ok(Some(Stop::new(move || autorun.stop())))
        },
        options,
    )
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
