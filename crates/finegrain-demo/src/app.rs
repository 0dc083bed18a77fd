#![forbid(unsafe_code)]

//! Top-level demo application: mounts the selected examples and drives them.

use tracing::{info, warn};
use web_time::Duration;

use crate::cli::{Opts, ScriptedClick};
use crate::error::{DemoError, Result};
use crate::host::Host;
use crate::scheduler::Scheduler;
use crate::screens::{self, Example, Stores};

/// What a run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Ticks driven.
    pub ticks: u64,
    /// Component renders caused by ticks and clicks (mount renders excluded).
    pub rerenders: usize,
    /// Scripted clicks pressed.
    pub clicks: usize,
    /// Frames reported through `on_frame`, the initial one included.
    pub frames: usize,
}

/// The mounted examples plus the stores they use.
#[derive(Debug)]
pub struct App {
    host: Host,
    stores: Stores,
}

impl App {
    /// Mount `example` on a fresh clock.
    ///
    /// # Errors
    ///
    /// Returns the first render failure.
    pub fn new(example: Example) -> Result<Self> {
        let mut host = Host::new(Scheduler::new());
        let mut stores = Stores::default();
        for section in screens::build(example, &mut stores) {
            host.mount(section)?;
        }
        info!(?example, stores = stores.iter().count(), "mounted");
        Ok(Self { host, stores })
    }

    #[must_use]
    pub fn host(&self) -> &Host {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut Host {
        &mut self.host
    }

    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    /// Drive `opts.ticks` ticks at `opts.tick_ms`, pressing scripted clicks.
    ///
    /// `on_frame` receives the tick number and the frame text whenever the
    /// frame changed (tick 0 is the initial frame).
    ///
    /// # Errors
    ///
    /// Stops at the first render failure or unknown button.
    pub fn run(&mut self, opts: &Opts, mut on_frame: impl FnMut(u64, &str)) -> Result<RunSummary> {
        let mut summary = RunSummary::default();
        let mut last = self.host.frame();
        on_frame(0, &last);
        summary.frames += 1;

        summary.rerenders += self.press(&opts.clicks, 0, &mut summary.clicks)?;
        self.report(0, &mut last, &mut on_frame, &mut summary.frames);

        let scheduler = self.host.scheduler().clone();
        let period = Duration::from_millis(opts.tick_ms);
        let mut failure: Option<DemoError> = None;
        let ticks = scheduler.run_for(opts.ticks, period, |tick| {
            let step = self.host.flush().and_then(|rendered| {
                let clicked = self.press(&opts.clicks, tick, &mut summary.clicks)?;
                Ok(rendered + clicked)
            });
            match step {
                Ok(rendered) => {
                    summary.rerenders += rendered;
                    self.drain_failures();
                    self.report(tick, &mut last, &mut on_frame, &mut summary.frames);
                    true
                }
                Err(err) => {
                    failure = Some(err);
                    false
                }
            }
        });
        if let Some(err) = failure {
            return Err(err);
        }
        summary.ticks = ticks;
        info!(
            ticks = summary.ticks,
            rerenders = summary.rerenders,
            clicks = summary.clicks,
            "run finished"
        );
        Ok(summary)
    }

    /// JSON document with render counts and every store's value.
    #[must_use]
    pub fn snapshot(&self) -> serde_json::Value {
        let renders: serde_json::Map<String, serde_json::Value> = self
            .host
            .render_counts()
            .into_iter()
            .filter(|(name, _)| *name != "Section")
            .map(|(name, n)| (name.to_string(), n.into()))
            .collect();
        serde_json::json!({
            "tick": self.host.scheduler().now(),
            "renders": renders,
            "stores": self.stores.snapshot(),
        })
    }

    fn press(&mut self, clicks: &[ScriptedClick], tick: u64, pressed: &mut usize) -> Result<usize> {
        let mut rendered = 0;
        for click in clicks.iter().filter(|c| c.tick == tick) {
            info!(button = %click.label, tick, "scripted click");
            rendered += self.host.click(&click.label)?;
            *pressed += 1;
        }
        Ok(rendered)
    }

    fn drain_failures(&self) {
        for (name, store) in self.stores.iter() {
            for failure in store.take_failures() {
                warn!(store = name, %failure, "notification failure");
            }
        }
    }

    fn report(
        &self,
        tick: u64,
        last: &mut String,
        on_frame: &mut impl FnMut(u64, &str),
        frames: &mut usize,
    ) {
        let frame = self.host.frame();
        if frame != *last {
            on_frame(tick, &frame);
            *frames += 1;
            *last = frame;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(ticks: u64, clicks: &[(&str, u64)]) -> Opts {
        Opts {
            ticks,
            tick_ms: 0,
            clicks: clicks
                .iter()
                .map(|(label, tick)| ScriptedClick {
                    label: (*label).to_string(),
                    tick: *tick,
                })
                .collect(),
            ..Opts::default()
        }
    }

    #[test]
    fn compare_run_counts_rerenders() {
        let mut app = App::new(Example::Compare).unwrap();
        let mut frames = Vec::new();
        let summary = app
            .run(&opts(3, &[]), |tick, _| frames.push(tick))
            .unwrap();
        assert_eq!(summary.ticks, 3);
        // Only the normal counter re-renders.
        assert_eq!(summary.rerenders, 3);
        assert_eq!(frames, vec![0, 1, 2, 3]);
        assert_eq!(app.host().render_count("FineGrainedCounter"), Some(1));
        assert_eq!(app.host().render_count("NormalCounter"), Some(4));
    }

    #[test]
    fn scripted_clicks_are_pressed() {
        let mut app = App::new(Example::Props).unwrap();
        let summary = app
            .run(
                &opts(2, &[("Increment Count 1", 0), ("Change Name to Jane", 2)]),
                |_, _| {},
            )
            .unwrap();
        assert_eq!(summary.clicks, 2);
        assert_eq!(summary.rerenders, 0);
        assert_eq!(
            app.host().slot_text("NameChild", "Name").as_deref(),
            Some("Updated at tick 2")
        );
        assert_eq!(app.host().slot_text("CountChild", "Count").as_deref(), Some("2"));
    }

    #[test]
    fn unknown_scripted_click_fails() {
        let mut app = App::new(Example::Context).unwrap();
        let err = app.run(&opts(3, &[("Nope", 1)]), |_, _| {}).unwrap_err();
        assert_eq!(err, DemoError::UnknownButton("Nope".into()));
        assert_eq!(app.host().scheduler().now(), 1);
    }

    #[test]
    fn snapshot_shape() {
        let mut app = App::new(Example::All).unwrap();
        app.run(&opts(2, &[]), |_, _| {}).unwrap();
        let snap = app.snapshot();
        assert_eq!(snap["tick"], 2);
        assert_eq!(snap["renders"]["FineGrainedCounter"], 1);
        assert_eq!(snap["renders"]["NormalCounter"], 3);
        assert_eq!(snap["stores"]["fine_grained.count"]["value"], 3);
        assert_eq!(
            snap["stores"]["context.state"]["value"],
            serde_json::json!({"profile": {"name": ""}})
        );
    }
}
