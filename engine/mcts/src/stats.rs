//! Atomic statistics shared by path nodes and shared position nodes.
//!
//! Every field is an atomic accessed with relaxed ordering: concurrent
//! readers always see *some* recently written value, and writers are expected
//! to be serialized by the caller's tree lock. The update arithmetic lives
//! here so both node kinds follow the same law.

use engine_core::GameResult;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

const RELAXED: Ordering = Ordering::Relaxed;

/// `f64` stored as its bit pattern
#[derive(Debug, Default)]
pub(crate) struct AtomicF64(AtomicU64);

impl AtomicF64 {
    pub(crate) fn new(v: f64) -> Self {
        Self(AtomicU64::new(v.to_bits()))
    }

    #[inline]
    pub(crate) fn load(&self) -> f64 {
        f64::from_bits(self.0.load(RELAXED))
    }

    #[inline]
    pub(crate) fn store(&self, v: f64) {
        self.0.store(v.to_bits(), RELAXED);
    }
}

/// `f32` stored as its bit pattern
#[derive(Debug, Default)]
pub(crate) struct AtomicF32(AtomicU32);

impl AtomicF32 {
    pub(crate) fn new(v: f32) -> Self {
        Self(AtomicU32::new(v.to_bits()))
    }

    #[inline]
    pub(crate) fn load(&self) -> f32 {
        f32::from_bits(self.0.load(RELAXED))
    }

    #[inline]
    pub(crate) fn store(&self, v: f32) {
        self.0.store(v.to_bits(), RELAXED);
    }
}

/// Value, draw probability, remaining length and visit counters.
///
/// `wl` is kept in double precision since it accumulates millions of small
/// increments; the other estimates are single precision.
#[derive(Debug)]
pub(crate) struct Stats {
    wl: AtomicF64,
    d: AtomicF32,
    m: AtomicF32,
    n: AtomicU32,
    n_in_flight: AtomicU32,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    pub(crate) fn new() -> Self {
        Self {
            wl: AtomicF64::new(0.0),
            d: AtomicF32::new(0.0),
            m: AtomicF32::new(0.0),
            n: AtomicU32::new(0),
            n_in_flight: AtomicU32::new(0),
        }
    }

    #[inline]
    pub(crate) fn wl(&self) -> f64 {
        self.wl.load()
    }

    #[inline]
    pub(crate) fn d(&self) -> f32 {
        self.d.load()
    }

    #[inline]
    pub(crate) fn m(&self) -> f32 {
        self.m.load()
    }

    #[inline]
    pub(crate) fn n(&self) -> u32 {
        self.n.load(RELAXED)
    }

    #[inline]
    pub(crate) fn n_in_flight(&self) -> u32 {
        self.n_in_flight.load(RELAXED)
    }

    pub(crate) fn set_values(&self, wl: f64, d: f32, m: f32) {
        self.wl.store(wl);
        self.d.store(d);
        self.m.store(m);
    }

    pub(crate) fn set_n(&self, n: u32) {
        self.n.store(n, RELAXED);
    }

    /// Zero everything, including the in-flight counter.
    pub(crate) fn reset(&self) {
        self.set_values(0.0, 0.0, 0.0);
        self.n.store(0, RELAXED);
        self.n_in_flight.store(0, RELAXED);
    }

    /// Fold `k` completed visits with result `(v, d, m)` into the means.
    pub(crate) fn finalize(&self, v: f32, d: f32, m: f32, k: u32) {
        let n = self.n();
        let wl = self.wl();
        let total = f64::from(n + k);
        self.wl.store(wl + f64::from(k) * (f64::from(v) - wl) / total);
        let total = total as f32;
        let kf = k as f32;
        let cur_d = self.d();
        self.d.store(cur_d + kf * (d - cur_d) / total);
        let cur_m = self.m();
        self.m.store(cur_m + kf * (m - cur_m) / total);
        self.n.store(n + k, RELAXED);
    }

    /// Add a terminal value delta to already-counted visits.
    pub(crate) fn adjust_for_terminal(&self, v: f32, d: f32, m: f32, k: u32) {
        let n = self.n();
        assert!(n > 0, "adjusting a node without visits");
        let kf = k as f32;
        let nf = n as f32;
        self.wl.store(self.wl() + f64::from(k) * f64::from(v) / f64::from(n));
        self.d.store(self.d() + kf * d / nf);
        self.m.store(self.m() + kf * m / nf);
    }

    /// Undo `finalize(v, d, m, k)`.
    ///
    /// Reverting the last visits leaves the neutral draw state behind.
    pub(crate) fn revert_terminal_visits(&self, v: f32, d: f32, m: f32, k: u32) {
        let n = self.n();
        if n <= k {
            self.set_values(0.0, 1.0, 0.0);
            self.n.store(0, RELAXED);
            return;
        }
        let remaining = n - k;
        let wl = self.wl();
        self.wl
            .store(wl - f64::from(k) * (f64::from(v) - wl) / f64::from(remaining));
        let kf = k as f32;
        let rf = remaining as f32;
        let cur_d = self.d();
        self.d.store(cur_d - kf * (d - cur_d) / rf);
        let cur_m = self.m();
        self.m.store(cur_m - kf * (m - cur_m) / rf);
        self.n.store(remaining, RELAXED);
    }

    /// Reserve one in-flight visit unless a first expansion is already under way.
    pub(crate) fn try_start(&self) -> bool {
        let n = self.n();
        self.n_in_flight
            .fetch_update(RELAXED, RELAXED, |f| {
                if n == 0 && f > 0 {
                    None
                } else {
                    Some(f + 1)
                }
            })
            .is_ok()
    }

    pub(crate) fn add_in_flight(&self, k: u32) {
        self.n_in_flight.fetch_add(k, RELAXED);
    }

    /// Release `k` in-flight visits.
    pub(crate) fn release_in_flight(&self, k: u32) {
        let prev = self
            .n_in_flight
            .fetch_update(RELAXED, RELAXED, |f| f.checked_sub(k));
        assert!(
            prev.is_ok(),
            "releasing {k} in-flight visits, only {} reserved",
            self.n_in_flight()
        );
    }

    pub(crate) fn zero_in_flight(&self) {
        self.n_in_flight.store(0, RELAXED);
    }
}

/// How a node came to be terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Terminal {
    #[default]
    NonTerminal = 0,
    /// Game over by the rules.
    EndOfGame = 1,
    /// Result proven by an endgame tablebase.
    Tablebase = 2,
    /// Treated as a draw by repetition without proof.
    Repetition = 3,
}

impl Terminal {
    fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0 => Terminal::NonTerminal,
            1 => Terminal::EndOfGame,
            2 => Terminal::Tablebase,
            _ => Terminal::Repetition,
        }
    }
}

/// Lower and upper proven result
pub type Bounds = (GameResult, GameResult);

/// The fully open proven interval.
pub const OPEN_BOUNDS: Bounds = (GameResult::Loss, GameResult::Win);

const TERMINAL_SHIFT: u8 = 0;
const LOWER_SHIFT: u8 = 2;
const UPPER_SHIFT: u8 = 4;
const TRANSPOSITION_BIT: u8 = 1 << 6;
const POPULATED_BIT: u8 = 1 << 7;

/// Terminal type, bounds and two sticky markers packed in one byte.
///
/// Layout: bits 0-1 terminal type, 2-3 lower bound, 4-5 upper bound,
/// bit 6 transposition, bit 7 populated from an evaluation.
#[derive(Debug)]
pub(crate) struct Flags(AtomicU8);

impl Default for Flags {
    fn default() -> Self {
        Self::new()
    }
}

impl Flags {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(Self::pack(Terminal::NonTerminal, OPEN_BOUNDS)))
    }

    fn pack(terminal: Terminal, (lower, upper): Bounds) -> u8 {
        ((terminal as u8) << TERMINAL_SHIFT)
            | (lower.bits() << LOWER_SHIFT)
            | (upper.bits() << UPPER_SHIFT)
    }

    fn update(&self, f: impl Fn(u8) -> u8) {
        // The closure never fails, so fetch_update always succeeds.
        let _ = self.0.fetch_update(RELAXED, RELAXED, |b| Some(f(b)));
    }

    pub(crate) fn terminal(&self) -> Terminal {
        Terminal::from_bits(self.0.load(RELAXED) >> TERMINAL_SHIFT)
    }

    pub(crate) fn bounds(&self) -> Bounds {
        let b = self.0.load(RELAXED);
        (
            GameResult::from_bits(b >> LOWER_SHIFT),
            GameResult::from_bits(b >> UPPER_SHIFT),
        )
    }

    pub(crate) fn set_terminal(&self, terminal: Terminal) {
        self.update(|b| (b & !(0b11 << TERMINAL_SHIFT)) | ((terminal as u8) << TERMINAL_SHIFT));
    }

    pub(crate) fn set_bounds(&self, (lower, upper): Bounds) {
        let mask = (0b11 << LOWER_SHIFT) | (0b11 << UPPER_SHIFT);
        self.update(|b| (b & !mask) | (lower.bits() << LOWER_SHIFT) | (upper.bits() << UPPER_SHIFT));
    }

    pub(crate) fn is_transposition(&self) -> bool {
        self.0.load(RELAXED) & TRANSPOSITION_BIT != 0
    }

    pub(crate) fn mark_transposition(&self) {
        self.0.fetch_or(TRANSPOSITION_BIT, RELAXED);
    }

    /// Set the populated marker, returning whether it was already set.
    pub(crate) fn mark_populated(&self) -> bool {
        self.0.fetch_or(POPULATED_BIT, RELAXED) & POPULATED_BIT != 0
    }
}
