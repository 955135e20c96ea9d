//! Server implementation.
//!
//! This is an authoritative server loop with tick-based simulation. One
//! `GameServer` value owns every piece of mutable world state:
//! - Drawing registry
//! - Live actor set (the simulation)
//! - Fixed-timestep clock and broadcast gate
//! - RNG
//!
//! It runs as a single task. HTTP and WebSocket handlers reach it through a
//! cloneable `ServerHandle`; each request becomes a `Command` that the task
//! executes between tick batches, so a batch of ticks always runs to
//! completion before any submission is applied.
//!
//! Determinism notes:
//! - Keep simulation in a fixed timestep.
//! - Seed the RNG from config when reproducible runs are needed.

use anyhow::Context;
use fishfight_shared::{
    config::ServerConfig,
    net::{encode, now_millis, Drawing, EatenEvent, ServerMsg, Snapshot},
};
use rand::{rngs::StdRng, SeedableRng};
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    time::{Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    actor::Actor,
    broadcast::{BroadcastGate, Broadcaster, Frame},
    clock::FixedTimestep,
    registry::{DrawingRegistry, DrawingSubmission},
    sim::Simulation,
};

const COMMAND_QUEUE: usize = 256;

/// Requests executed inside the server task.
#[derive(Debug)]
pub enum Command {
    Submit {
        submission: DrawingSubmission,
        reply: oneshot::Sender<Drawing>,
    },
    ListDrawings {
        reply: oneshot::Sender<Vec<Drawing>>,
    },
    Connect {
        reply: oneshot::Sender<Connection>,
    },
    Console {
        line: String,
        reply: oneshot::Sender<Vec<String>>,
    },
}

/// A freshly subscribed client: its first snapshot plus the live feed.
#[derive(Debug)]
pub struct Connection {
    pub initial: Frame,
    pub updates: broadcast::Receiver<Frame>,
}

/// Cloneable entry point into a running `GameServer`.
#[derive(Debug, Clone)]
pub struct ServerHandle {
    tx: mpsc::Sender<Command>,
}

impl ServerHandle {
    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> anyhow::Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| anyhow::anyhow!("server task stopped"))?;
        rx.await.context("server dropped request")
    }

    /// Registers a validated drawing; returns the stored record.
    pub async fn submit(&self, submission: DrawingSubmission) -> anyhow::Result<Drawing> {
        self.request(|reply| Command::Submit { submission, reply }).await
    }

    pub async fn list_drawings(&self) -> anyhow::Result<Vec<Drawing>> {
        self.request(|reply| Command::ListDrawings { reply }).await
    }

    /// Subscribes a new client.
    pub async fn connect(&self) -> anyhow::Result<Connection> {
        self.request(|reply| Command::Connect { reply }).await
    }

    pub async fn console(&self, line: impl Into<String>) -> anyhow::Result<Vec<String>> {
        let line = line.into();
        self.request(|reply| Command::Console { line, reply }).await
    }
}

/// Game server.
pub struct GameServer {
    pub cfg: ServerConfig,
    registry: DrawingRegistry,
    sim: Simulation,
    clock: FixedTimestep,
    gate: BroadcastGate,
    hub: Broadcaster,
    rng: StdRng,
    tick: u64,
    running: bool,

    commands: mpsc::Receiver<Command>,
    handle: ServerHandle,

    /// Channel for console commands from stdin.
    console_rx: Option<mpsc::Receiver<String>>,
}

impl GameServer {
    /// Creates a server with an empty registry.
    pub fn new(cfg: ServerConfig) -> Self {
        Self::with_drawings(cfg, Vec::new())
    }

    /// Creates a server from previously stored drawings, spawning one actor
    /// per distinct id.
    pub fn with_drawings(cfg: ServerConfig, drawings: Vec<Drawing>) -> Self {
        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let sim = Simulation::new(cfg.world, &mut rng);
        let (tx, commands) = mpsc::channel(COMMAND_QUEUE);

        let mut server = Self {
            clock: FixedTimestep::new(cfg.tick_hz, Instant::now()),
            gate: BroadcastGate::new(cfg.broadcast_hz),
            cfg,
            registry: DrawingRegistry::from_drawings(drawings),
            sim,
            hub: Broadcaster::default(),
            rng,
            tick: 0,
            running: true,
            commands,
            handle: ServerHandle { tx },
            console_rx: None,
        };

        let stored = server.registry.list_all().to_vec();
        for drawing in &stored {
            server.spawn_if_missing(drawing);
        }
        if !stored.is_empty() {
            info!(drawings = stored.len(), actors = server.sim.len(), "Respawned stored drawings");
        }
        server
    }

    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    /// Sets the console input receiver.
    pub fn set_console_input(&mut self, rx: mpsc::Receiver<String>) {
        self.console_rx = Some(rx);
    }

    pub fn registry(&self) -> &DrawingRegistry {
        &self.registry
    }

    pub fn sim(&self) -> &Simulation {
        &self.sim
    }

    pub fn sim_mut(&mut self) -> &mut Simulation {
        &mut self.sim
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.hub
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Stores a drawing, spawns its actor if none is alive under that id, and
    /// announces it to every client.
    pub fn submit(&mut self, submission: DrawingSubmission) -> Drawing {
        let drawing = self.registry.submit(submission, &mut self.rng).clone();
        let spawned = self.spawn_if_missing(&drawing);
        info!(id = %drawing.id, strokes = drawing.strokes.len(), spawned, "Drawing submitted");

        self.emit(&ServerMsg::NewDrawing(drawing.clone()));
        drawing
    }

    /// Spawns an actor for `drawing` unless one with its id is alive.
    pub fn spawn_if_missing(&mut self, drawing: &Drawing) -> bool {
        if self.sim.contains(&drawing.id) {
            return false;
        }
        let actor = Actor::spawn(drawing, self.cfg.world, self.cfg.tuning, &mut self.rng);
        debug!(id = %actor.id, x = actor.pos.x, y = actor.pos.y, heading = actor.heading, "Actor spawned");
        self.sim.insert(actor)
    }

    pub fn snapshot(&self) -> Snapshot {
        self.sim.snapshot(now_millis())
    }

    /// Subscribes a client and builds its first snapshot in the same turn, so
    /// nothing emitted afterwards can be missed.
    pub fn connect(&mut self) -> anyhow::Result<Connection> {
        let updates = self.hub.subscribe();
        let initial: Frame = encode(&ServerMsg::State(self.snapshot()))?.into();
        info!(clients = self.hub.client_count(), "Client connected");
        Ok(Connection { initial, updates })
    }

    /// Executes one fixed simulation step and emits its meals immediately.
    pub fn step(&mut self, dt_sec: f32) -> Vec<EatenEvent> {
        let events = self.sim.step(dt_sec);
        for event in &events {
            self.emit(&ServerMsg::Eaten(event.clone()));
        }
        self.tick += 1;
        events
    }

    /// Runs every step that has accrued by `now`, then sends a snapshot if
    /// the gate is open. Returns the number of steps run.
    pub fn run_due_ticks(&mut self, now: Instant) -> u32 {
        let steps = self.clock.advance(now);
        let dt = self.cfg.tick_dt();
        for _ in 0..steps {
            self.step(dt);
        }
        if steps > 0 && self.gate.ready(now) {
            self.broadcast_state();
        }
        steps
    }

    /// Sends the full snapshot to every client.
    pub fn broadcast_state(&self) {
        self.emit(&ServerMsg::State(self.snapshot()));
    }

    fn emit(&self, msg: &ServerMsg) {
        match self.hub.send(msg) {
            Ok(reached) => debug!(event = msg.event_name(), reached, "Broadcast"),
            Err(e) => warn!(event = msg.event_name(), error = %e, "Failed to encode broadcast"),
        }
    }

    /// Runs the server for a number of ticks.
    pub async fn run_for_ticks(&mut self, ticks: u32) -> anyhow::Result<()> {
        let dt = self.clock.step();
        let mut next = Instant::now();

        for _ in 0..ticks {
            next += dt;
            self.drain_commands();
            self.step(dt.as_secs_f32());
            if self.gate.ready(Instant::now()) {
                self.broadcast_state();
            }
            tokio::time::sleep_until(next).await;
        }
        Ok(())
    }

    /// Main loop: interleaves tick batches with queued commands until `quit`.
    pub async fn run(mut self) -> anyhow::Result<()> {
        let mut ticker = tokio::time::interval(self.clock.step());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            tick_hz = self.cfg.tick_hz,
            broadcast_hz = self.cfg.broadcast_hz,
            world_w = self.cfg.world.w,
            world_h = self.cfg.world.h,
            "Simulation running"
        );

        while self.running {
            tokio::select! {
                now = ticker.tick() => {
                    self.process_console_commands();
                    self.run_due_ticks(now);
                }
                Some(cmd) = self.commands.recv() => self.handle_command(cmd),
            }
        }
        info!(tick = self.tick, "Server stopped");
        Ok(())
    }

    fn drain_commands(&mut self) {
        while let Ok(cmd) = self.commands.try_recv() {
            self.handle_command(cmd);
        }
    }

    fn handle_command(&mut self, cmd: Command) {
        // A dropped reply receiver means the requester gave up; nothing to do.
        match cmd {
            Command::Submit { submission, reply } => {
                let drawing = self.submit(submission);
                let _ = reply.send(drawing);
            }
            Command::ListDrawings { reply } => {
                let _ = reply.send(self.registry.list_all().to_vec());
            }
            Command::Connect { reply } => match self.connect() {
                Ok(conn) => {
                    let _ = reply.send(conn);
                }
                Err(e) => warn!(error = %e, "Failed to build initial snapshot"),
            },
            Command::Console { line, reply } => {
                let _ = reply.send(self.exec_console(&line));
            }
        }
    }

    fn process_console_commands(&mut self) {
        // Collect lines first to avoid borrow conflict
        let lines: Vec<String> = match self.console_rx {
            Some(ref mut rx) => {
                let mut collected = Vec::new();
                while let Ok(line) = rx.try_recv() {
                    collected.push(line);
                }
                collected
            }
            None => Vec::new(),
        };

        for line in lines {
            for out in self.exec_console(&line) {
                println!("{out}");
            }
        }
    }

    /// Executes a console command.
    pub fn exec_console(&mut self, line: &str) -> Vec<String> {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let Some(&command) = tokens.first() else {
            return Vec::new();
        };

        match command {
            "status" => vec![
                format!("Tick: {}", self.tick),
                format!("World: {}x{}", self.cfg.world.w, self.cfg.world.h),
                format!("Actors: {}", self.sim.len()),
                format!("Drawings: {}", self.registry.len()),
                format!("Clients: {}", self.hub.client_count()),
            ],
            "drawings" => {
                let mut out: Vec<String> = self
                    .registry
                    .list_all()
                    .iter()
                    .map(|d| {
                        format!(
                            "  {}: strokes={} anchors={} alive={}",
                            d.id,
                            d.strokes.len(),
                            d.anchors.is_some(),
                            self.sim.contains(&d.id)
                        )
                    })
                    .collect();
                out.insert(0, format!("{} drawing(s)", out.len()));
                out
            }
            "quit" | "exit" => {
                info!("Server shutting down");
                self.running = false;
                vec!["Shutting down".to_string()]
            }
            other => vec![format!("Unknown command: {other}")],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fishfight_shared::{
        math::Vec2,
        net::{decode, Anchors, Bounds},
    };
    use std::time::Duration;

    fn cfg() -> ServerConfig {
        ServerConfig {
            seed: Some(17),
            ..Default::default()
        }
    }

    fn submission(id: Option<&str>) -> DrawingSubmission {
        DrawingSubmission {
            id: id.map(str::to_string),
            strokes: vec![vec![Vec2::new(1.0, 1.0), Vec2::new(30.0, 30.0)]],
            bounds: Bounds::new(0.0, 0.0, 40.0, 40.0),
            anchors: Some(Anchors {
                mouth: Vec2::new(35.0, 20.0),
                back: Vec2::new(5.0, 20.0),
            }),
        }
    }

    #[test]
    fn submit_spawns_actor_and_announces_drawing() {
        let mut server = GameServer::new(cfg());
        let mut rx = server.broadcaster().subscribe();

        let drawing = server.submit(submission(None));
        assert!(server.sim().contains(&drawing.id));
        assert_eq!(server.registry().len(), 1);

        let frame = rx.try_recv().unwrap();
        assert_eq!(decode(&frame).unwrap(), ServerMsg::NewDrawing(drawing));
    }

    #[test]
    fn resubmitting_live_id_keeps_single_actor() {
        let mut server = GameServer::new(cfg());
        server.submit(submission(Some("fish")));
        server.submit(submission(Some("fish")));
        assert_eq!(server.registry().len(), 2);
        assert_eq!(server.sim().len(), 1);
    }

    #[test]
    fn eaten_id_respawns_only_on_new_submission() {
        let mut server = GameServer::new(cfg());
        server.submit(submission(Some("a")));
        server.submit(submission(Some("b")));
        {
            let sim = server.sim_mut();
            let a = sim.get_mut("a").unwrap();
            a.pos = Vec2::new(500.0, 500.0);
            a.heading = 0.0;
            let b = sim.get_mut("b").unwrap();
            b.pos = Vec2::new(532.0, 500.0);
            b.heading = 0.0;
        }
        let mut rx = server.broadcaster().subscribe();
        let events = server.step(0.0);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].prey_id, "b");
        assert!(matches!(decode(&rx.try_recv().unwrap()).unwrap(), ServerMsg::Eaten(_)));

        for _ in 0..30 {
            server.step(1.0 / 30.0);
        }
        assert!(!server.sim().contains("b"));

        server.submit(submission(Some("b")));
        assert!(server.sim().contains("b"));
    }

    #[test]
    fn restart_respawns_one_actor_per_id() {
        let mut first = GameServer::new(cfg());
        first.submit(submission(Some("x")));
        first.submit(submission(Some("y")));
        first.submit(submission(Some("x")));

        let restarted = GameServer::with_drawings(cfg(), first.registry().list_all().to_vec());
        assert_eq!(restarted.registry().len(), 3);
        assert_eq!(restarted.sim().len(), 2);
    }

    #[test]
    fn connect_sends_full_snapshot() {
        let mut server = GameServer::new(cfg());
        server.submit(submission(Some("a")));
        let conn = server.connect().unwrap();
        match decode(&conn.initial).unwrap() {
            ServerMsg::State(snap) => {
                assert_eq!(snap.world, server.cfg.world);
                assert_eq!(snap.actors.len(), 1);
                assert_eq!(snap.actors[0].id, "a");
            }
            other => panic!("expected state, got {other:?}"),
        }
        assert_eq!(server.broadcaster().client_count(), 1);
    }

    #[test]
    fn due_ticks_are_batched_and_snapshots_gated() {
        let mut server = GameServer::new(cfg());
        let mut rx = server.broadcaster().subscribe();
        let start = Instant::now();

        let steps = server.run_due_ticks(start + Duration::from_millis(500));
        assert!(steps >= 15);
        assert_eq!(server.tick(), u64::from(steps));
        assert!(matches!(decode(&rx.try_recv().unwrap()).unwrap(), ServerMsg::State(_)));

        // Gate closed: a tick 34ms later produces no second snapshot.
        let later = start + Duration::from_millis(534);
        assert_eq!(server.run_due_ticks(later), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn console_reports_status_and_quits() {
        let mut server = GameServer::new(cfg());
        server.submit(submission(Some("a")));
        let status = server.exec_console("status");
        assert!(status.contains(&"Actors: 1".to_string()));
        assert!(status.contains(&"Drawings: 1".to_string()));

        let listing = server.exec_console("drawings");
        assert_eq!(listing[0], "1 drawing(s)");
        assert!(listing[1].contains("a: strokes=1 anchors=true alive=true"));

        assert_eq!(server.exec_console("bogus"), vec!["Unknown command: bogus"]);
        assert!(server.exec_console("   ").is_empty());
        server.exec_console("quit");
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn handle_round_trips_through_running_task() -> anyhow::Result<()> {
        let server = GameServer::new(cfg());
        let handle = server.handle();
        let task = tokio::spawn(server.run());

        let stored = handle.submit(submission(None)).await?;
        let listed = handle.list_drawings().await?;
        assert_eq!(listed, vec![stored]);

        let conn = handle.connect().await?;
        assert!(matches!(decode(&conn.initial)?, ServerMsg::State(_)));

        handle.console("quit").await?;
        task.await??;
        Ok(())
    }
}
