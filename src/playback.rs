//! Playback controller: the running / frozen / free-rotate state machine
//! that decides when frames are fetched and how long to wait for keys.

use crate::{
    constants::{FROZEN_DELAY_MS, KEY_ESCAPE, KEY_PAUSE, KEY_SPACE, ROTATE_POLL_MS, RUNNING_DELAY_MS},
    source::FrameSource,
    Result,
};
use log::{debug, info};
use opencv::highgui;

/// Keyboard input as seen by the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Exit,
    Pause,
    Resume,
    /// Any other code, including the poll timeout
    Other,
}

impl KeyEvent {
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        match code {
            KEY_ESCAPE => Self::Exit,
            KEY_PAUSE => Self::Pause,
            KEY_SPACE => Self::Resume,
            _ => Self::Other,
        }
    }
}

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Fetch, process and show a frame every iteration
    Running,
    /// Block on the keyboard, no frames fetched
    Frozen,
    /// Paused, but the 3D canvas keeps redrawing for mouse rotation
    FreeRotate,
    /// Terminal
    Stopped,
}

impl PlaybackState {
    /// Next state after `key`
    #[must_use]
    pub fn transition(self, key: KeyEvent, rotate_enabled: bool) -> Self {
        use KeyEvent as K;
        match (self, key) {
            (Self::Stopped, _) | (_, K::Exit) => Self::Stopped,
            (Self::Running, K::Pause) if rotate_enabled => Self::FreeRotate,
            (Self::Running, K::Pause) => Self::Frozen,
            (Self::Running, _) => Self::Running,
            (Self::Frozen, K::Pause) => Self::Running,
            (Self::Frozen, _) => Self::Frozen,
            (Self::FreeRotate, K::Pause | K::Resume) => Self::Running,
            (Self::FreeRotate, K::Other) => Self::FreeRotate,
        }
    }

    /// Key wait in milliseconds; 0 blocks until a key is pressed
    #[must_use]
    pub fn wait_delay(self, rotate_poll_ms: i32) -> Option<i32> {
        match self {
            Self::Running => Some(RUNNING_DELAY_MS),
            Self::Frozen => Some(FROZEN_DELAY_MS),
            Self::FreeRotate => Some(rotate_poll_ms),
            Self::Stopped => None,
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Stopped
    }
}

/// Source of key codes
pub trait KeyInput {
    /// Wait up to `delay_ms` (0 = forever) and return the key code, or -1
    fn wait_key(&mut self, delay_ms: i32) -> Result<i32>;
}

/// Keys from the highgui windows
#[derive(Debug, Default, Clone, Copy)]
pub struct HighGuiKeys;

impl KeyInput for HighGuiKeys {
    fn wait_key(&mut self, delay_ms: i32) -> Result<i32> {
        Ok(highgui::wait_key(delay_ms)?)
    }
}

/// Work done by the controller on each state
pub trait FrameHandler<F> {
    /// Process and display one fetched frame
    fn handle_frame(&mut self, frame: F) -> Result<()>;

    /// Redraw the last scene, used while rotating a paused view
    fn redraw_scene(&mut self) -> Result<()>;
}

/// Why the loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndOfStream,
    UserExit,
}

/// Result of a playback run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackSummary {
    pub frames: usize,
    pub reason: StopReason,
}

/// Drives a frame source through the state machine
#[derive(Debug, Clone)]
pub struct PlaybackController {
    state: PlaybackState,
    rotate_enabled: bool,
    rotate_poll_ms: i32,
}

impl PlaybackController {
    #[must_use]
    pub fn new(rotate_enabled: bool) -> Self {
        Self {
            state: PlaybackState::Running,
            rotate_enabled,
            rotate_poll_ms: ROTATE_POLL_MS,
        }
    }

    #[must_use]
    pub fn with_rotate_poll(mut self, rotate_poll_ms: i32) -> Self {
        self.rotate_poll_ms = rotate_poll_ms;
        self
    }

    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    fn poll<K: KeyInput>(&mut self, keys: &mut K) -> Result<()> {
        let Some(delay) = self.state.wait_delay(self.rotate_poll_ms) else {
            return Ok(());
        };
        let key = KeyEvent::from_code(keys.wait_key(delay)?);
        let next = self.state.transition(key, self.rotate_enabled);
        if next != self.state {
            debug!("Playback {:?} -> {:?} on {:?}", self.state, next, key);
        }
        self.state = next;
        Ok(())
    }

    /// Run until the source is exhausted or the user exits
    pub fn run<S, K, H>(&mut self, source: &mut S, keys: &mut K, handler: &mut H) -> Result<PlaybackSummary>
    where
        S: FrameSource,
        K: KeyInput,
        H: FrameHandler<S::Frame>,
    {
        let mut frames = 0;
        loop {
            match self.state {
                PlaybackState::Running => {
                    let Some(frame) = source.next_frame()? else {
                        info!("End of stream after {} frames", frames);
                        self.state = PlaybackState::Stopped;
                        return Ok(PlaybackSummary {
                            frames,
                            reason: StopReason::EndOfStream,
                        });
                    };
                    handler.handle_frame(frame)?;
                    frames += 1;
                }
                PlaybackState::FreeRotate => handler.redraw_scene()?,
                PlaybackState::Frozen => {}
                PlaybackState::Stopped => {
                    info!("Stopped by user after {} frames", frames);
                    return Ok(PlaybackSummary {
                        frames,
                        reason: StopReason::UserExit,
                    });
                }
            }
            self.poll(keys)?;
        }
    }
}
