use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval},
};

use super::driver::PlayerEvent;

/// How often a playing [`SimulatedVideo`] reports its position.
pub const TICK: Duration = Duration::from_millis(250);

/// The video element as the driver sees it. Implementations report
/// `TimeUpdate` and `Ended` back through the player's event channel.
pub trait VideoSurface: Send {
    fn current_time(&self) -> f64;
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, to: f64);
}

#[derive(Debug)]
struct Clock {
    position: f64,
    anchor: Option<Instant>,
    duration: f64,
}

impl Clock {
    fn now(&self) -> f64 {
        match self.anchor {
            Some(anchor) => (self.position + anchor.elapsed().as_secs_f64()).min(self.duration),
            None => self.position,
        }
    }
}

/// A clock standing in for a rendered video: advances in real (tokio) time
/// while playing and ticks every [`TICK`].
pub struct SimulatedVideo {
    clock: Arc<Mutex<Clock>>,
    ticker: JoinHandle<()>,
}

impl SimulatedVideo {
    pub fn new(duration: f64, events: mpsc::Sender<PlayerEvent>) -> Self {
        let clock = Arc::new(Mutex::new(Clock {
            position: 0.0,
            anchor: None,
            duration: duration.max(0.0),
        }));
        let ticker = tokio::spawn(tick(Arc::clone(&clock), events));
        Self { clock, ticker }
    }

    pub fn duration(&self) -> f64 {
        self.lock().duration
    }

    pub fn is_playing(&self) -> bool {
        self.lock().anchor.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, Clock> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

async fn tick(clock: Arc<Mutex<Clock>>, events: mpsc::Sender<PlayerEvent>) {
    let mut ticks = interval(TICK);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        ticks.tick().await;
        let (now, ended) = {
            let mut clock = clock.lock().unwrap_or_else(PoisonError::into_inner);
            if clock.anchor.is_none() {
                continue;
            }
            let now = clock.now();
            let ended = now >= clock.duration;
            if ended {
                clock.position = clock.duration;
                clock.anchor = None;
            }
            (now, ended)
        };

        if events.send(PlayerEvent::TimeUpdate(now)).await.is_err() {
            return;
        }
        if ended && events.send(PlayerEvent::Ended).await.is_err() {
            return;
        }
    }
}

impl VideoSurface for SimulatedVideo {
    fn current_time(&self) -> f64 {
        self.lock().now()
    }

    fn play(&mut self) {
        let mut clock = self.lock();
        if clock.anchor.is_some() {
            return;
        }
        if clock.position >= clock.duration {
            clock.position = 0.0;
        }
        clock.anchor = Some(Instant::now());
    }

    fn pause(&mut self) {
        let mut clock = self.lock();
        clock.position = clock.now();
        clock.anchor = None;
    }

    fn seek(&mut self, to: f64) {
        let mut clock = self.lock();
        clock.position = to.clamp(0.0, clock.duration);
        if clock.anchor.is_some() {
            clock.anchor = Some(Instant::now());
        }
    }
}

impl Drop for SimulatedVideo {
    fn drop(&mut self) {
        self.ticker.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn advances_only_while_playing() {
        let (tx, _rx) = mpsc::channel(64);
        let mut video = SimulatedVideo::new(10.0, tx);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(video.current_time(), 0.0);

        video.play();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(video.current_time(), 2.0);

        video.pause();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(video.current_time(), 2.0);

        video.seek(7.5);
        assert_eq!(video.current_time(), 7.5);
        video.seek(42.0);
        assert_eq!(video.current_time(), 10.0);
    }

    #[tokio::test(start_paused = true)]
    async fn reports_time_updates_then_end() {
        let (tx, mut rx) = mpsc::channel(64);
        let mut video = SimulatedVideo::new(1.0, tx);
        video.play();

        let mut updates = Vec::new();
        loop {
            match rx.recv().await {
                Some(PlayerEvent::TimeUpdate(t)) => updates.push(t),
                Some(PlayerEvent::Ended) => break,
                other => panic!("unexpected event {other:?}"),
            }
        }
        assert_eq!(updates.last(), Some(&1.0));
        assert!(updates.windows(2).all(|w| w[0] <= w[1]));
        assert!(!video.is_playing());

        video.play();
        assert_eq!(video.current_time(), 0.0, "playing at the end starts over");
    }
}
