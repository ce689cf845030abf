//! # Módulo de Relojes
//!
//! Fuente de tiempo compartida por los ejecutores y los módulos de una
//! ejecución. Hay dos implementaciones:
//!
//! - [`RealClock`]: tiempo de pared y `thread::sleep`. Las esperas medidas
//!   incluyen la latencia real del sistema operativo.
//! - [`VirtualClock`]: tiempo simulado y determinista. Los hilos de los
//!   procesos siguen siendo hilos reales, pero sólo uno avanza a la vez (el
//!   que tiene el *turno*) y el tiempo salta al siguiente vencimiento cuando
//!   ningún proceso puede avanzar. Dos ejecuciones con la misma entrada
//!   producen exactamente los mismos tiempos.
//!
//! Cada ejecutor participa con un `slot` (su índice en la lista de procesos).
//! Los métodos de participación son no-ops en el reloj real.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::sync::{lock, wait_while};

/// Fuente de tiempo de una ejecución.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Tiempo transcurrido desde la época del reloj.
    fn now(&self) -> Duration;

    /// Simula `duration` de trabajo del participante `slot`.
    fn sleep(&self, slot: usize, duration: Duration);

    /// Registra `participants` participantes, con slots `0..participants`.
    fn enroll(&self, _participants: usize) {}

    /// Bloquea hasta que `slot` puede avanzar.
    fn resume(&self, _slot: usize) {}

    /// `slot` queda bloqueado esperando un módulo.
    fn park(&self, _slot: usize) {}

    /// `slot` recibió el módulo que esperaba y vuelve a estar listo.
    fn unpark(&self, _slot: usize) {}

    /// `slot` terminó y deja de participar.
    fn retire(&self, _slot: usize) {}
}

/// Tipo de reloj a construir para una ejecución.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    #[default]
    Real,
    Virtual,
}

impl ClockMode {
    /// Construye un reloj nuevo con época en el momento actual.
    pub fn build(&self) -> Arc<dyn Clock> {
        match self {
            Self::Real => Arc::new(RealClock::new()),
            Self::Virtual => Arc::new(VirtualClock::new()),
        }
    }
}

impl fmt::Display for ClockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Real => write!(f, "real"),
            Self::Virtual => write!(f, "virtual"),
        }
    }
}

/// Reloj de pared.
#[derive(Debug)]
pub struct RealClock {
    epoch: Instant,
}

impl RealClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for RealClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for RealClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }

    fn sleep(&self, _slot: usize, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}

#[derive(Debug, Default)]
struct Timeline {
    now: Duration,
    /// Participante que tiene el turno
    running: Option<usize>,
    /// Participantes listos esperando turno, en orden de slot
    ready: BTreeSet<usize>,
    /// Participantes dormidos, por vencimiento y slot
    sleeping: BinaryHeap<Reverse<(Duration, usize)>>,
}

impl Timeline {
    /// Entrega el turno si nadie lo tiene. Sin listos, avanza el tiempo
    /// hasta el vencimiento más próximo y despierta a todos los que vencen.
    fn dispatch(&mut self) {
        if self.running.is_some() {
            return;
        }

        if self.ready.is_empty() {
            let Some(Reverse((deadline, _))) = self.sleeping.peek().copied() else {
                return;
            };
            self.now = self.now.max(deadline);
            while let Some(Reverse((deadline, slot))) = self.sleeping.peek().copied() {
                if deadline > self.now {
                    break;
                }
                self.sleeping.pop();
                self.ready.insert(slot);
            }
        }

        self.running = self.ready.pop_first();
        trace!(now = ?self.now, running = ?self.running, "virtual clock dispatch");
    }

    fn yield_turn(&mut self, slot: usize) {
        if self.running == Some(slot) {
            self.running = None;
            self.dispatch();
        }
    }
}

/// Reloj simulado con turnos deterministas.
///
/// Invariantes:
/// - como mucho un participante tiene el turno;
/// - el tiempo sólo avanza cuando no hay participantes listos;
/// - entre listos, el turno va al slot más bajo.
#[derive(Debug, Default)]
pub struct VirtualClock {
    timeline: Mutex<Timeline>,
    turn: Condvar,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Clock for VirtualClock {
    fn now(&self) -> Duration {
        lock(&self.timeline).now
    }

    fn sleep(&self, slot: usize, duration: Duration) {
        if duration.is_zero() {
            return;
        }

        let mut timeline = lock(&self.timeline);
        let deadline = timeline.now + duration;
        timeline.sleeping.push(Reverse((deadline, slot)));
        timeline.yield_turn(slot);
        self.turn.notify_all();

        let _timeline = wait_while(&self.turn, timeline, |t| t.running != Some(slot));
    }

    fn enroll(&self, participants: usize) {
        let mut timeline = lock(&self.timeline);
        timeline.ready.extend(0..participants);
        timeline.dispatch();
        self.turn.notify_all();
    }

    fn resume(&self, slot: usize) {
        let timeline = lock(&self.timeline);
        let _timeline = wait_while(&self.turn, timeline, |t| t.running != Some(slot));
    }

    fn park(&self, slot: usize) {
        let mut timeline = lock(&self.timeline);
        timeline.yield_turn(slot);
        self.turn.notify_all();
    }

    fn unpark(&self, slot: usize) {
        let mut timeline = lock(&self.timeline);
        timeline.ready.insert(slot);
        timeline.dispatch();
        self.turn.notify_all();
    }

    fn retire(&self, slot: usize) {
        let mut timeline = lock(&self.timeline);
        timeline.ready.remove(&slot);
        timeline.sleeping.retain(|Reverse((_, sleeper))| *sleeper != slot);
        timeline.yield_turn(slot);
        self.turn.notify_all();
    }
}
