//! Aggregator: the event loop's dispatch table
//!
//! Ties the core context, the renderer, the delivery manager and the
//! input plugins together and reacts to each `LoopEvent`. Signal handling
//! and startup live in the binary; everything here is testable by
//! feeding events by hand.

use crate::context::Core;
use crate::delivery::{DeliveryManager, ReconnectPolicy};
use crate::event::{LoopEvent, LoopReceiver};
use crate::plugin::{InputPlugin, Renderer};
use log::{debug, info, trace};
use rg_status_types::SectionOverride;
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Everything needed to build an aggregator besides its plugins
#[derive(Debug, Clone, Default)]
pub struct AggregatorSettings {
    pub display_order: Vec<String>,
    pub overrides: HashMap<String, SectionOverride>,
    pub reconnect: ReconnectPolicy,
    /// Render once, deliver, then quit
    pub one_shot: bool,
}

/// What the event loop should do after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Aggregator {
    core: Core,
    renderer: Box<dyn Renderer>,
    delivery: DeliveryManager,
    inputs: Vec<Box<dyn InputPlugin>>,
    events: LoopReceiver,
    one_shot: bool,
    started: bool,
}

impl Aggregator {
    pub fn new(settings: AggregatorSettings, renderer: Box<dyn Renderer>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let core = Core::new(settings.display_order, settings.overrides, tx.clone());
        let delivery = DeliveryManager::new(
            renderer.header(),
            renderer.action_parser(),
            settings.reconnect,
            tx,
        );
        Self {
            core,
            renderer,
            delivery,
            inputs: Vec::new(),
            events: rx,
            one_shot: settings.one_shot,
            started: false,
        }
    }

    /// Context handed to input plugin factories
    pub fn core(&self) -> &Core {
        &self.core
    }

    pub fn delivery(&self) -> &DeliveryManager {
        &self.delivery
    }

    pub fn delivery_mut(&mut self) -> &mut DeliveryManager {
        &mut self.delivery
    }

    pub fn renderer_name(&self) -> &'static str {
        self.renderer.name()
    }

    pub fn add_input(&mut self, input: Box<dyn InputPlugin>) {
        debug!("Input plugin {} ready", input.name());
        self.inputs.push(input);
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Resume every input plugin and leave suppression
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        info!("Starting {} input plugins", self.inputs.len());
        for input in &mut self.inputs {
            input.start();
        }
        self.core.start();
        self.started = true;
    }

    /// Pause every input plugin and suppress display
    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        info!("Stopping {} input plugins", self.inputs.len());
        for input in &mut self.inputs {
            input.stop();
        }
        self.core.stop();
        self.started = false;
    }

    /// The regeneration task: render the snapshot and broadcast it
    pub fn regenerate(&mut self) -> Flow {
        let line = self.core.regenerate(self.renderer.as_mut());
        trace!("Regenerated: {}", line);
        self.delivery.put_line(line);
        if self.one_shot {
            Flow::Quit
        } else {
            Flow::Continue
        }
    }

    pub fn handle_event(&mut self, event: LoopEvent) -> Flow {
        match event {
            LoopEvent::Regenerate => return self.regenerate(),
            LoopEvent::Action(action) => {
                self.core.route_event(&action);
            }
            LoopEvent::Accepted { server, peer, io } => {
                debug!("Listener {} accepted {}", server, peer);
                self.delivery.add_peer(peer, io);
            }
            LoopEvent::StreamClosed(id) => {
                self.delivery.remove_stream(id);
            }
            LoopEvent::ServerClosed(id) => {
                self.delivery.remove_server(id);
            }
            LoopEvent::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Wait for the next event
    pub async fn next_event(&mut self) -> Option<LoopEvent> {
        self.events.recv().await
    }

    /// Next event if one is already queued
    pub fn try_next_event(&mut self) -> Option<LoopEvent> {
        self.events.try_recv().ok()
    }

    /// Process events until told to quit
    pub async fn run(&mut self) {
        while let Some(event) = self.next_event().await {
            if self.handle_event(event) == Flow::Quit {
                break;
            }
        }
    }

    /// Tear down in dependency order: inputs, renderer, streams
    pub async fn shutdown(mut self) {
        self.stop();
        for input in &mut self.inputs {
            input.uninit();
        }
        // Dropping plugins drops their section handles
        self.inputs.clear();
        self.renderer.uninit();
        self.delivery.shutdown().await;
        info!("Shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionEvent;
    use crate::delivery::StreamIo;
    use crate::section::{Section, SectionBuilder};
    use crate::SectionHandle;
    use rg_status_types::State;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncBufReadExt, BufReader};
    use tokio::task::LocalSet;
    use tokio::time::timeout;

    struct Joined {
        passes: Rc<Cell<usize>>,
    }

    impl Renderer for Joined {
        fn name(&self) -> &'static str {
            "joined"
        }

        fn render(&mut self, sections: &mut [&mut Section]) -> String {
            self.passes.set(self.passes.get() + 1);
            sections
                .iter()
                .filter_map(|s| s.value())
                .collect::<Vec<_>>()
                .join("|")
        }
    }

    /// Counts lifecycle calls; owns one section that toggles on click
    struct Toggle {
        handle: Rc<RefCell<Option<SectionHandle>>>,
        log: Rc<RefCell<Vec<&'static str>>>,
    }

    impl Toggle {
        fn create(core: &Core, log: Rc<RefCell<Vec<&'static str>>>) -> Self {
            let handle: Rc<RefCell<Option<SectionHandle>>> = Rc::new(RefCell::new(None));
            let weak = Rc::downgrade(&handle);
            let section = core
                .insert(SectionBuilder::new("toggle").action(move |event| {
                    if let Some(handle) = weak.upgrade() {
                        if let Some(h) = handle.borrow().as_ref() {
                            h.set_value(format!("clicked {}", event));
                        }
                    }
                }))
                .unwrap();
            section.set_value("idle");
            *handle.borrow_mut() = Some(section);
            Self { handle, log }
        }
    }

    impl InputPlugin for Toggle {
        fn name(&self) -> &str {
            "toggle"
        }

        fn start(&mut self) {
            self.log.borrow_mut().push("start");
        }

        fn stop(&mut self) {
            self.log.borrow_mut().push("stop");
        }

        fn uninit(&mut self) {
            self.log.borrow_mut().push("uninit");
            self.handle.borrow_mut().take();
        }
    }

    fn aggregator(one_shot: bool) -> (Aggregator, Rc<Cell<usize>>) {
        let passes = Rc::new(Cell::new(0));
        let renderer = Box::new(Joined {
            passes: Rc::clone(&passes),
        });
        let settings = AggregatorSettings {
            one_shot,
            ..Default::default()
        };
        (Aggregator::new(settings, renderer), passes)
    }

    /// Handle everything queued right now
    fn pump(aggregator: &mut Aggregator) -> Flow {
        while let Some(event) = aggregator.try_next_event() {
            if aggregator.handle_event(event) == Flow::Quit {
                return Flow::Quit;
            }
        }
        Flow::Continue
    }

    #[test]
    fn test_start_renders_once_with_initial_values() {
        let (mut agg, passes) = aggregator(false);
        let log = Rc::new(RefCell::new(Vec::new()));
        let toggle = Toggle::create(agg.core(), Rc::clone(&log));
        agg.add_input(Box::new(toggle));
        assert_eq!(pump(&mut agg), Flow::Continue);
        assert_eq!(passes.get(), 0);

        agg.start();
        pump(&mut agg);
        assert_eq!(passes.get(), 1);
        assert_eq!(agg.delivery().latest(), Some("idle"));
        assert_eq!(*log.borrow(), vec!["start"]);
    }

    #[test]
    fn test_action_round_trip() {
        let (mut agg, passes) = aggregator(false);
        let log = Rc::new(RefCell::new(Vec::new()));
        agg.add_input(Box::new(Toggle::create(agg.core(), log)));
        agg.start();
        pump(&mut agg);

        agg.handle_event(LoopEvent::Action(ActionEvent::new("toggle", "mouse:1")));
        pump(&mut agg);
        assert_eq!(passes.get(), 2);
        assert_eq!(agg.delivery().latest(), Some("clicked mouse:1"));

        // unknown section: silently dropped, nothing re-rendered
        agg.handle_event(LoopEvent::Action(ActionEvent::new("battery:BAT0", "mouse:1")));
        pump(&mut agg);
        assert_eq!(passes.get(), 2);
    }

    #[test]
    fn test_stop_suppresses_until_restart() {
        let (mut agg, passes) = aggregator(false);
        let log = Rc::new(RefCell::new(Vec::new()));
        agg.add_input(Box::new(Toggle::create(agg.core(), Rc::clone(&log))));
        agg.start();
        pump(&mut agg);
        agg.stop();
        agg.handle_event(LoopEvent::Action(ActionEvent::new("toggle", "mouse:3")));
        pump(&mut agg);
        assert_eq!(passes.get(), 1);

        agg.start();
        pump(&mut agg);
        assert_eq!(passes.get(), 2);
        assert_eq!(*log.borrow(), vec!["start", "stop", "start"]);
    }

    #[test]
    fn test_urgent_while_stopped_renders() {
        let (mut agg, passes) = aggregator(false);
        let section = agg.core().insert(SectionBuilder::new("battery")).unwrap();
        section.set_value("5%");
        section.set_state(State::Bad, true);
        pump(&mut agg);
        assert_eq!(passes.get(), 1);
        assert_eq!(agg.delivery().latest(), Some("5%"));
    }

    #[test]
    fn test_one_shot_quits_after_first_render() {
        let (mut agg, passes) = aggregator(true);
        let _section = agg.core().insert(SectionBuilder::new("time")).unwrap();
        agg.start();
        assert_eq!(pump(&mut agg), Flow::Quit);
        assert_eq!(passes.get(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_order_and_delivery() {
        LocalSet::new()
            .run_until(async {
                let (mut agg, _passes) = aggregator(false);
                let log = Rc::new(RefCell::new(Vec::new()));
                agg.add_input(Box::new(Toggle::create(agg.core(), Rc::clone(&log))));
                let (local, remote) = duplex(1024);
                agg.delivery_mut().add_peer("test", StreamIo::split(local));
                agg.start();
                pump(&mut agg);

                let core = agg.core().clone();
                agg.shutdown().await;
                assert_eq!(*log.borrow(), vec!["start", "stop", "uninit"]);
                assert!(core.is_empty());

                let mut lines = BufReader::new(remote).lines();
                let line = timeout(Duration::from_secs(5), lines.next_line())
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(line.as_deref(), Some("idle"));
            })
            .await;
    }
}
