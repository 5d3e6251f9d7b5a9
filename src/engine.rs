use crate::audio::{faded, MusicOutput, SoundEffect, FADE_INTERVAL_MS};
use crate::coach::{self, Coach, CoachFeedback, CoachReply};
use crate::runtime::{Scheduler, TimerId};
use crate::session::{Countdown, GameStatus, SessionConfig, SessionStats, SessionSummary};
use chrono::Local;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const TICK_MS: u64 = 100;
pub const COUNTDOWN_FROM: u8 = 3;
pub const COUNTDOWN_STEP_MS: u64 = 1_000;
/// How long "GO!" stays up before play begins.
pub const GO_HOLD_MS: u64 = 500;

/// What changed inside the engine, in the order it happened.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StatusChanged { from: GameStatus, to: GameStatus },
    Countdown(Option<Countdown>),
    Hit { points: u64, combo: u32 },
    Miss,
    Finished(SessionSummary),
    Feedback(CoachFeedback),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    Tick,
    CountdownStep,
    CountdownGo,
    Fade,
}

/// Owns the status machine, the session tallies and every timer tied to them.
///
/// All mutation happens on the caller's thread. Time only moves through
/// [`SessionEngine::advance`], which runs due timers one at a time.
pub struct SessionEngine {
    config: SessionConfig,
    status: GameStatus,
    countdown: Option<Countdown>,
    stats: SessionStats,
    elapsed_ms: u64,
    remaining_ms: u64,
    session_id: u64,
    scheduler: Scheduler<TimerKind>,
    tick_timer: Option<TimerId>,
    countdown_timer: Option<TimerId>,
    fade_timer: Option<TimerId>,
    music: Option<Box<dyn MusicOutput>>,
    hit_sound: Option<Box<dyn SoundEffect>>,
    coach: Arc<dyn Coach>,
    feedback: Option<CoachFeedback>,
    loading_feedback: bool,
    reply_tx: Sender<CoachReply>,
    reply_rx: Receiver<CoachReply>,
    events: Vec<SessionEvent>,
}

impl SessionEngine {
    pub fn new(config: SessionConfig, coach: Arc<dyn Coach>) -> Self {
        let (reply_tx, reply_rx) = mpsc::channel();
        let remaining_ms = config.duration_ms;
        Self {
            config,
            status: GameStatus::Idle,
            countdown: None,
            stats: SessionStats::default(),
            elapsed_ms: 0,
            remaining_ms,
            session_id: 0,
            scheduler: Scheduler::new(),
            tick_timer: None,
            countdown_timer: None,
            fade_timer: None,
            music: None,
            hit_sound: None,
            coach,
            feedback: None,
            loading_feedback: false,
            reply_tx,
            reply_rx,
            events: Vec::new(),
        }
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn countdown(&self) -> Option<Countdown> {
        self.countdown
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn now_ms(&self) -> u64 {
        self.scheduler.now_ms()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn remaining_ms(&self) -> u64 {
        self.remaining_ms
    }

    pub fn time_elapsed(&self) -> f64 {
        self.elapsed_ms as f64 / 1000.0
    }

    pub fn time_left(&self) -> f64 {
        self.remaining_ms as f64 / 1000.0
    }

    pub fn feedback(&self) -> Option<&CoachFeedback> {
        self.feedback.as_ref()
    }

    pub fn is_loading_feedback(&self) -> bool {
        self.loading_feedback
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary::new(&self.stats, self.elapsed_ms)
    }

    pub fn set_indefinite(&mut self, indefinite: bool) {
        self.config.indefinite = indefinite;
    }

    /// Swap the music handle. The old handle is paused and any fade on it stops.
    pub fn set_music(&mut self, music: Option<Box<dyn MusicOutput>>) {
        if let Some(id) = self.fade_timer.take() {
            self.scheduler.cancel(id);
        }
        if let Some(old) = self.music.as_mut() {
            old.pause();
        }
        self.music = music;
    }

    pub fn set_hit_sound(&mut self, sound: Option<Box<dyn SoundEffect>>) {
        self.hit_sound = sound;
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    // commands

    /// Idle/Finished → Countdown with fresh stats.
    pub fn start(&mut self) {
        if !matches!(self.status, GameStatus::Idle | GameStatus::Finished) {
            return;
        }
        self.cancel_tick();
        self.cancel_countdown();

        self.session_id += 1;
        self.stats = SessionStats::fresh(Local::now());
        self.elapsed_ms = 0;
        self.remaining_ms = self.config.duration_ms;
        self.feedback = None;
        self.loading_feedback = false;
        self.set_countdown(None);

        log::info!("session {} waiting for pointer lock", self.session_id);
        self.transition(GameStatus::Countdown);
    }

    /// Pointer lock acquired: begin counting down, once.
    pub fn pointer_engaged(&mut self) {
        if self.status != GameStatus::Countdown || self.countdown.is_some() {
            return;
        }
        self.set_countdown(Some(Countdown::Count(COUNTDOWN_FROM)));
        self.countdown_timer = Some(
            self.scheduler
                .schedule_once(COUNTDOWN_STEP_MS, TimerKind::CountdownStep),
        );
    }

    pub fn pause(&mut self) {
        if self.status != GameStatus::Playing {
            return;
        }
        self.cancel_tick();
        self.fade_out_music();
        self.transition(GameStatus::Paused);
    }

    pub fn resume(&mut self) {
        if self.status != GameStatus::Paused {
            return;
        }
        self.transition(GameStatus::Playing);
        self.start_tick();
        self.play_music();
    }

    pub fn quit(&mut self) {
        if !matches!(self.status, GameStatus::Playing | GameStatus::Paused) {
            return;
        }
        self.cancel_tick();
        self.cancel_countdown();
        self.fade_out_music();
        self.set_countdown(None);
        self.transition(GameStatus::Idle);
    }

    /// End the session now instead of waiting for the clock.
    pub fn finish(&mut self) {
        if self.status == GameStatus::Playing {
            self.finish_session();
        }
    }

    /// Returns the points awarded, or `None` outside of play.
    pub fn register_hit(&mut self) -> Option<u64> {
        if self.status != GameStatus::Playing {
            return None;
        }
        if let Some(sound) = self.hit_sound.as_mut() {
            sound.restart();
        }
        let points = self.stats.record_hit();
        self.events.push(SessionEvent::Hit {
            points,
            combo: self.stats.combo,
        });
        Some(points)
    }

    pub fn register_miss(&mut self) {
        if self.status != GameStatus::Playing {
            return;
        }
        self.stats.record_miss();
        self.events.push(SessionEvent::Miss);
    }

    // time

    /// Move the clock forward, firing every timer that falls due on the way.
    pub fn advance(&mut self, dt_ms: u64) {
        let until = self.scheduler.now_ms() + dt_ms;
        while let Some((id, kind)) = self.scheduler.pop_due(until) {
            self.fire(id, kind);
        }
        self.scheduler.advance_to(until);
        self.poll_feedback();
    }

    /// Apply any coach replies that have arrived, without blocking.
    pub fn poll_feedback(&mut self) {
        while let Ok(reply) = self.reply_rx.try_recv() {
            self.apply_reply(reply);
        }
    }

    /// Block up to `timeout` for the current session's feedback.
    pub fn wait_for_feedback(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.loading_feedback {
            let left = deadline.saturating_duration_since(Instant::now());
            match self.reply_rx.recv_timeout(left) {
                Ok(reply) => self.apply_reply(reply),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        self.feedback.is_some()
    }

    fn fire(&mut self, id: TimerId, kind: TimerKind) {
        match kind {
            TimerKind::Tick if self.tick_timer == Some(id) => self.on_tick(),
            TimerKind::CountdownStep if self.countdown_timer == Some(id) => self.step_countdown(),
            TimerKind::CountdownGo if self.countdown_timer == Some(id) => {
                self.countdown_timer = None;
                self.set_countdown(None);
                self.enter_playing();
            }
            TimerKind::Fade => self.fade_step(id),
            _ => {
                log::debug!("dropping stale {:?} timer", kind);
                self.scheduler.cancel(id);
            }
        }
    }

    fn on_tick(&mut self) {
        let before = self.elapsed_ms;
        self.elapsed_ms += TICK_MS;
        if self.elapsed_ms / 1000 > before / 1000 {
            self.stats.history.push(self.stats.score);
        }

        if !self.config.indefinite {
            if self.remaining_ms <= TICK_MS {
                self.remaining_ms = 0;
                self.finish_session();
            } else {
                self.remaining_ms -= TICK_MS;
            }
        }
    }

    fn step_countdown(&mut self) {
        self.countdown_timer = None;
        match self.countdown {
            Some(Countdown::Count(n)) if n > 1 => {
                self.set_countdown(Some(Countdown::Count(n - 1)));
                self.countdown_timer = Some(
                    self.scheduler
                        .schedule_once(COUNTDOWN_STEP_MS, TimerKind::CountdownStep),
                );
            }
            Some(Countdown::Count(_)) => {
                self.set_countdown(Some(Countdown::Go));
                self.countdown_timer =
                    Some(self.scheduler.schedule_once(GO_HOLD_MS, TimerKind::CountdownGo));
            }
            _ => {}
        }
    }

    fn enter_playing(&mut self) {
        log::info!("session {} playing", self.session_id);
        self.transition(GameStatus::Playing);
        self.start_tick();
        self.play_music();
    }

    fn finish_session(&mut self) {
        self.cancel_tick();
        self.stats.end_time = Some(Local::now());
        self.fade_out_music();
        self.transition(GameStatus::Finished);

        let summary = self.summary();
        log::info!(
            "session {} finished: score {} accuracy {}%",
            self.session_id,
            summary.score,
            summary.accuracy
        );
        self.events.push(SessionEvent::Finished(summary));

        self.loading_feedback = true;
        coach::dispatch(
            Arc::clone(&self.coach),
            self.session_id,
            self.stats.clone(),
            self.reply_tx.clone(),
        );
    }

    fn apply_reply(&mut self, reply: CoachReply) {
        if reply.session != self.session_id || !self.loading_feedback {
            log::debug!("discarding coach reply for session {}", reply.session);
            return;
        }
        self.loading_feedback = false;
        self.feedback = Some(reply.feedback.clone());
        self.events.push(SessionEvent::Feedback(reply.feedback));
    }

    fn transition(&mut self, to: GameStatus) {
        let from = self.status;
        self.status = to;
        log::debug!("status {} -> {}", from, to);
        self.events.push(SessionEvent::StatusChanged { from, to });
    }

    fn set_countdown(&mut self, countdown: Option<Countdown>) {
        if self.countdown != countdown {
            self.countdown = countdown;
            self.events.push(SessionEvent::Countdown(countdown));
        }
    }

    fn start_tick(&mut self) {
        self.cancel_tick();
        self.tick_timer = Some(self.scheduler.schedule_every(TICK_MS, TimerKind::Tick));
    }

    fn cancel_tick(&mut self) {
        if let Some(id) = self.tick_timer.take() {
            self.scheduler.cancel(id);
        }
    }

    fn cancel_countdown(&mut self) {
        if let Some(id) = self.countdown_timer.take() {
            self.scheduler.cancel(id);
        }
    }

    fn play_music(&mut self) {
        if let Some(id) = self.fade_timer.take() {
            self.scheduler.cancel(id);
        }
        if let Some(music) = self.music.as_mut() {
            music.set_volume(1.0);
            music.play();
        }
    }

    fn fade_out_music(&mut self) {
        let audible = self.music.as_ref().is_some_and(|m| m.volume() > 0.0);
        if audible && self.fade_timer.is_none() {
            self.fade_timer = Some(
                self.scheduler
                    .schedule_every(FADE_INTERVAL_MS, TimerKind::Fade),
            );
        }
    }

    fn fade_step(&mut self, id: TimerId) {
        let done = match self.music.as_mut() {
            Some(music) => {
                let volume = faded(music.volume());
                music.set_volume(volume);
                if volume <= 0.0 {
                    music.pause();
                }
                volume <= 0.0
            }
            None => true,
        };
        if done || self.fade_timer != Some(id) {
            self.scheduler.cancel(id);
            if self.fade_timer == Some(id) {
                self.fade_timer = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coach::NoCoach;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn engine() -> SessionEngine {
        SessionEngine::new(SessionConfig::default(), Arc::new(NoCoach))
    }

    fn engine_with(duration_ms: u64) -> SessionEngine {
        SessionEngine::new(
            SessionConfig {
                duration_ms,
                indefinite: false,
            },
            Arc::new(NoCoach),
        )
    }

    /// Start, engage pointer lock and run the countdown through to play.
    fn playing(mut e: SessionEngine) -> SessionEngine {
        e.start();
        e.pointer_engaged();
        e.advance(3 * COUNTDOWN_STEP_MS + GO_HOLD_MS);
        assert_eq!(e.status(), GameStatus::Playing);
        e.drain_events();
        e
    }

    #[derive(Default)]
    struct Track {
        volume: f32,
        playing: bool,
        plays: u32,
    }

    struct FakeMusic(Rc<RefCell<Track>>);

    impl MusicOutput for FakeMusic {
        fn volume(&self) -> f32 {
            self.0.borrow().volume
        }
        fn set_volume(&mut self, volume: f32) {
            self.0.borrow_mut().volume = volume;
        }
        fn play(&mut self) {
            let mut t = self.0.borrow_mut();
            t.playing = true;
            t.plays += 1;
        }
        fn pause(&mut self) {
            self.0.borrow_mut().playing = false;
        }
    }

    struct FakeSound(Rc<RefCell<u32>>);

    impl SoundEffect for FakeSound {
        fn restart(&mut self) {
            *self.0.borrow_mut() += 1;
        }
    }

    #[test]
    fn new_engine_is_idle() {
        let e = engine();
        assert_eq!(e.status(), GameStatus::Idle);
        assert_eq!(e.countdown(), None);
        assert_eq!(e.time_left(), 30.0);
        assert!(!e.is_loading_feedback());
    }

    #[test]
    fn start_enters_countdown_waiting_for_lock() {
        let mut e = engine();
        e.start();
        assert_eq!(e.status(), GameStatus::Countdown);
        assert_eq!(e.countdown(), None);
        assert_eq!(e.stats().history, vec![0]);

        // nothing happens without pointer lock
        e.advance(10_000);
        assert_eq!(e.status(), GameStatus::Countdown);
        assert_eq!(e.countdown(), None);
    }

    #[test]
    fn countdown_runs_three_two_one_go_then_plays() {
        let mut e = engine();
        e.start();
        e.drain_events();
        e.pointer_engaged();

        let mut seen = vec![e.countdown()];
        for _ in 0..3 {
            e.advance(COUNTDOWN_STEP_MS);
            seen.push(e.countdown());
        }
        assert_eq!(
            seen,
            vec![
                Some(Countdown::Count(3)),
                Some(Countdown::Count(2)),
                Some(Countdown::Count(1)),
                Some(Countdown::Go)
            ]
        );
        assert_eq!(e.status(), GameStatus::Countdown);

        e.advance(GO_HOLD_MS - 1);
        assert_eq!(e.status(), GameStatus::Countdown);
        e.advance(1);
        assert_eq!(e.status(), GameStatus::Playing);
        assert_eq!(e.countdown(), None);

        let countdowns: Vec<_> = e
            .drain_events()
            .into_iter()
            .filter_map(|ev| match ev {
                SessionEvent::Countdown(c) => Some(c),
                _ => None,
            })
            .collect();
        assert_eq!(
            countdowns,
            vec![
                Some(Countdown::Count(3)),
                Some(Countdown::Count(2)),
                Some(Countdown::Count(1)),
                Some(Countdown::Go),
                None
            ]
        );
    }

    #[test]
    fn repeated_pointer_lock_does_not_restart_the_countdown() {
        let mut e = engine();
        e.start();
        e.pointer_engaged();
        e.advance(COUNTDOWN_STEP_MS);
        e.pointer_engaged();
        assert_eq!(e.countdown(), Some(Countdown::Count(2)));
    }

    #[test]
    fn ten_hits_score_1050() {
        let mut e = playing(engine());
        for _ in 0..10 {
            e.register_hit();
        }
        assert_eq!(e.stats().score, 1050);
        assert_eq!(e.stats().max_combo, 10);
    }

    #[test]
    fn hits_and_misses_outside_play_are_ignored() {
        let mut e = engine();
        assert_eq!(e.register_hit(), None);
        e.register_miss();
        e.start();
        assert_eq!(e.register_hit(), None);
        assert_eq!(e.stats().attempts(), 0);
    }

    #[test]
    fn hit_plays_the_sound_from_the_start() {
        let count = Rc::new(RefCell::new(0));
        let mut e = playing(engine());
        e.set_hit_sound(Some(Box::new(FakeSound(Rc::clone(&count)))));
        e.register_hit();
        e.register_hit();
        e.register_miss();
        assert_eq!(*count.borrow(), 2);
        assert_eq!(
            e.drain_events(),
            vec![
                SessionEvent::Hit { points: 100, combo: 1 },
                SessionEvent::Hit { points: 100, combo: 2 },
                SessionEvent::Miss
            ]
        );
    }

    #[test]
    fn three_ticks_from_point_three_finish_at_exactly_zero() {
        let mut e = playing(engine_with(300));
        e.advance(TICK_MS);
        e.advance(TICK_MS);
        assert_eq!(e.status(), GameStatus::Playing);
        assert_eq!(e.remaining_ms(), 100);
        e.advance(TICK_MS);
        assert_eq!(e.status(), GameStatus::Finished);
        assert_eq!(e.time_left(), 0.0);
        assert!(e.stats().end_time.is_some());
    }

    #[test]
    fn history_gains_one_sample_per_whole_second() {
        let mut e = playing(engine_with(3_000));
        let mut lengths = vec![];
        for _ in 0..30 {
            e.register_hit();
            e.advance(TICK_MS);
            lengths.push(e.stats().history.len());
        }
        assert_eq!(e.status(), GameStatus::Finished);
        assert_eq!(e.stats().history.len(), 4);
        assert_eq!(lengths[8], 1);
        assert_eq!(lengths[9], 2);
        assert_eq!(lengths[19], 3);
        assert_eq!(lengths[29], 4);
        let history = &e.stats().history;
        assert_eq!(history[0], 0);
        assert_eq!(history[1], 1050);
        assert_eq!(history[3], e.stats().score);
    }

    #[test]
    fn indefinite_sessions_never_finish_on_their_own() {
        let mut e = engine_with(300);
        e.set_indefinite(true);
        let mut e = playing(e);
        e.advance(60_000);
        assert_eq!(e.status(), GameStatus::Playing);
        assert_eq!(e.remaining_ms(), 300);
        assert_eq!(e.elapsed_ms(), 60_000);
        assert_eq!(e.stats().history.len(), 61);

        e.finish();
        assert_eq!(e.status(), GameStatus::Finished);
    }

    #[test]
    fn pause_stops_the_clock_and_resume_restarts_it() {
        let mut e = playing(engine());
        e.advance(1_000);
        e.pause();
        assert_eq!(e.status(), GameStatus::Paused);
        e.advance(5_000);
        assert_eq!(e.elapsed_ms(), 1_000);

        e.resume();
        e.advance(500);
        assert_eq!(e.elapsed_ms(), 1_500);
        assert_eq!(e.remaining_ms(), 28_500);
    }

    #[test]
    fn pause_and_resume_are_idempotent() {
        let mut e = playing(engine());
        e.resume();
        assert!(e.drain_events().is_empty());
        e.advance(TICK_MS);
        assert_eq!(e.elapsed_ms(), 100);

        e.pause();
        e.pause();
        let changes = e
            .drain_events()
            .into_iter()
            .filter(|ev| matches!(ev, SessionEvent::StatusChanged { .. }))
            .count();
        assert_eq!(changes, 1);

        e.resume();
        e.advance(TICK_MS);
        // one tick timer, not two
        assert_eq!(e.elapsed_ms(), 200);
    }

    #[test]
    fn quit_returns_to_idle_and_silences_timers() {
        let mut e = playing(engine());
        e.advance(1_000);
        e.quit();
        assert_eq!(e.status(), GameStatus::Idle);
        e.advance(60_000);
        assert_eq!(e.elapsed_ms(), 1_000);

        let mut e = playing(engine());
        e.pause();
        e.quit();
        assert_eq!(e.status(), GameStatus::Idle);
    }

    #[test]
    fn illegal_commands_are_no_ops() {
        let mut e = engine();
        e.pause();
        e.resume();
        e.quit();
        e.finish();
        e.pointer_engaged();
        assert_eq!(e.status(), GameStatus::Idle);
        assert!(e.drain_events().is_empty());

        e.start();
        e.start();
        e.quit();
        assert_eq!(e.status(), GameStatus::Countdown);
        assert_eq!(e.session_id(), 1);
    }

    #[test]
    fn finish_requests_feedback_and_falls_back_offline() {
        let mut e = playing(engine_with(200));
        e.register_hit();
        e.advance(TICK_MS);
        e.finish();
        assert_eq!(e.status(), GameStatus::Finished);
        assert!(e.is_loading_feedback());
        assert!(e.drain_events().iter().any(|ev| matches!(
            ev,
            SessionEvent::Finished(summary) if summary.hits == 1 && summary.score == 100
        )));

        assert!(e.wait_for_feedback(Duration::from_secs(5)));
        assert!(!e.is_loading_feedback());
        assert_eq!(e.feedback(), Some(&CoachFeedback::fallback()));
    }

    #[test]
    fn restart_from_finished_resets_everything() {
        let mut e = playing(engine_with(200));
        e.register_hit();
        e.register_miss();
        e.advance(200);
        e.wait_for_feedback(Duration::from_secs(5));

        e.start();
        assert_eq!(e.status(), GameStatus::Countdown);
        assert_eq!(e.stats().score, 0);
        assert_eq!(e.stats().attempts(), 0);
        assert_eq!(e.remaining_ms(), 200);
        assert_eq!(e.elapsed_ms(), 0);
        assert_eq!(e.feedback(), None);
        assert_eq!(e.session_id(), 2);
    }

    #[test]
    fn late_feedback_for_an_old_session_is_discarded() {
        let mut e = playing(engine_with(100));
        e.advance(100);
        assert_eq!(e.status(), GameStatus::Finished);
        // restart before the reply lands
        e.start();
        std::thread::sleep(Duration::from_millis(50));
        e.reply_tx
            .send(CoachReply {
                session: 1,
                feedback: CoachFeedback {
                    text: "stale".into(),
                    rating: "BOT".into(),
                },
            })
            .unwrap();
        e.poll_feedback();
        assert_eq!(e.feedback(), None);
        assert!(!e.is_loading_feedback());
    }

    #[test]
    fn music_plays_on_start_and_fades_on_pause() {
        let track = Rc::new(RefCell::new(Track::default()));
        let mut e = engine();
        e.set_music(Some(Box::new(FakeMusic(Rc::clone(&track)))));
        let mut e = playing(e);
        assert!(track.borrow().playing);
        assert_eq!(track.borrow().volume, 1.0);

        e.pause();
        e.advance(FADE_INTERVAL_MS * 10);
        assert!(track.borrow().volume > 0.4 && track.borrow().volume < 0.6);
        assert!(track.borrow().playing);

        e.advance(FADE_INTERVAL_MS * 10);
        assert_eq!(track.borrow().volume, 0.0);
        assert!(!track.borrow().playing);

        e.resume();
        assert_eq!(track.borrow().volume, 1.0);
        assert_eq!(track.borrow().plays, 2);
    }

    #[test]
    fn resume_mid_fade_keeps_full_volume() {
        let track = Rc::new(RefCell::new(Track::default()));
        let mut e = engine();
        e.set_music(Some(Box::new(FakeMusic(Rc::clone(&track)))));
        let mut e = playing(e);
        e.pause();
        e.advance(FADE_INTERVAL_MS * 5);
        e.resume();
        e.advance(2_000);
        assert_eq!(track.borrow().volume, 1.0);
    }

    #[test]
    fn fade_stops_when_the_handle_goes_away() {
        let track = Rc::new(RefCell::new(Track::default()));
        let mut e = engine();
        e.set_music(Some(Box::new(FakeMusic(Rc::clone(&track)))));
        let mut e = playing(e);
        e.quit();
        e.advance(FADE_INTERVAL_MS * 3);
        e.set_music(None);
        e.advance(FADE_INTERVAL_MS * 30);
        assert!(e.fade_timer.is_none());
        assert_eq!(e.scheduler.pending(), 0);
    }

    #[test]
    fn replacing_the_handle_mid_fade_spares_the_new_one() {
        let old = Rc::new(RefCell::new(Track::default()));
        let mut e = engine();
        e.set_music(Some(Box::new(FakeMusic(Rc::clone(&old)))));
        let mut e = playing(e);
        e.pause();
        e.advance(FADE_INTERVAL_MS * 2);

        let new = Rc::new(RefCell::new(Track {
            volume: 1.0,
            playing: true,
            plays: 0,
        }));
        e.set_music(Some(Box::new(FakeMusic(Rc::clone(&new)))));
        e.advance(2_000);

        assert_eq!(new.borrow().volume, 1.0);
        assert!(new.borrow().playing);
        assert!(!old.borrow().playing);
        assert!(e.fade_timer.is_none());
    }
}
