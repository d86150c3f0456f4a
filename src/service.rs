//! Turn orchestration with state machine.
//!
//! AwaitingSignIn → Ready ⇄ Listening ⇄ AwaitingReply
//!
//! One `tokio::select!` loop owns all conversation state and multiplexes
//! stdin commands, the capture auto-stop tick, and agent-reply completions
//! arriving over an mpsc channel. Each agent request is tagged with a turn
//! id; completions for any other id are dropped so a late response from an
//! abandoned turn can never append out of order.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::agent::AgentClient;
use crate::capture::CaptureController;
use crate::config::Config;
use crate::error::ClientError;
use crate::languages::{profile_for, LanguageProfile};
use crate::normalize;
use crate::playback::PlaybackController;
use crate::stt::SpeechRecognizer;
use crate::synthesizer::SpeechSynthesizer;
use crate::transcript::{ChatMessage, Sender, Transcript};

/// Shown as the agent-side transcript entry when the agent call fails, so
/// the conversation stays legible.
pub const AGENT_FAILURE_TEXT: &str = "Error contacting agent.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    AwaitingSignIn,
    Ready,
    Listening,
    AwaitingReply,
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingSignIn => write!(f, "AWAITING-SIGN-IN"),
            Self::Ready => write!(f, "READY"),
            Self::Listening => write!(f, "LISTENING"),
            Self::AwaitingReply => write!(f, "AWAITING-REPLY"),
        }
    }
}

/// All mutable conversation state, owned by the service loop. No hidden
/// statics: token, transcript, turn bookkeeping and the error slot live
/// here and die with the session.
pub struct ConversationSession {
    access_token: Option<String>,
    pub session_id: String,
    pub profile: &'static LanguageProfile,
    pub transcript: Transcript,
    pub state: TurnState,
    pub last_error: Option<String>,
    next_turn: u64,
    current_turn: Option<u64>,
}

impl ConversationSession {
    pub fn new(session_id: String, language: &str) -> Self {
        Self {
            access_token: None,
            session_id,
            profile: profile_for(language),
            transcript: Transcript::new(),
            state: TurnState::AwaitingSignIn,
            last_error: None,
            next_turn: 0,
            current_turn: None,
        }
    }

    pub fn sign_in(&mut self, token: String) {
        self.access_token = Some(token);
        self.state = TurnState::Ready;
        self.last_error = None;
    }

    /// Clear the token and the transcript; the session id survives (it is
    /// persisted separately with its own expiry).
    pub fn sign_out(&mut self) {
        self.access_token = None;
        self.transcript.clear();
        self.current_turn = None;
        self.state = TurnState::AwaitingSignIn;
    }

    pub fn is_signed_in(&self) -> bool {
        self.access_token.is_some()
    }

    pub fn token(&self) -> Option<&str> {
        self.access_token.as_deref()
    }

    pub fn select_language(&mut self, code: &str) {
        self.profile = profile_for(code);
        info!("Language profile: {} ({})", self.profile.label, self.profile.code);
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.last_error = Some(message.into());
    }

    /// Begin a turn: append the user entry optimistically, enter
    /// AwaitingReply, and hand back a fresh turn id. Refused while another
    /// turn is in flight or before sign-in.
    pub fn begin_turn(&mut self, text: &str) -> Option<u64> {
        if !self.is_signed_in() || self.state == TurnState::AwaitingReply {
            return None;
        }
        self.transcript.push(ChatMessage::user(text));
        self.last_error = None;
        self.state = TurnState::AwaitingReply;
        self.next_turn += 1;
        self.current_turn = Some(self.next_turn);
        self.current_turn
    }

    /// Complete a turn. Stale ids (from an abandoned turn) are dropped
    /// without touching the transcript. Returns the reply text to speak
    /// on success.
    pub fn complete_turn(
        &mut self,
        turn: u64,
        result: Result<String, ClientError>,
    ) -> Option<String> {
        if self.current_turn != Some(turn) {
            debug!("Dropping stale reply for turn {turn}");
            return None;
        }
        self.current_turn = None;
        self.state = TurnState::Ready;

        match result {
            Ok(reply) => {
                self.transcript.push(ChatMessage::agent(reply.clone()));
                Some(reply)
            }
            Err(e) => {
                self.transcript.push(ChatMessage::agent(AGENT_FAILURE_TEXT));
                self.last_error = Some(e.to_string());
                None
            }
        }
    }
}

enum TurnEvent {
    AgentReply {
        turn: u64,
        result: Result<String, ClientError>,
    },
}

pub struct ConversationService {
    config: Config,
    session: ConversationSession,
    agent: Arc<AgentClient>,
    recognizer: SpeechRecognizer,
    synthesizer: SpeechSynthesizer,
    playback: PlaybackController,
    capture: CaptureController,
    events_tx: mpsc::Sender<TurnEvent>,
    /// Taken by `run`; kept optional so the loop can own the receiver
    /// while handlers borrow the service.
    events_rx: Option<mpsc::Receiver<TurnEvent>>,
}

impl ConversationService {
    pub fn new(config: Config, session_id: String, token: String) -> Result<Self, ClientError> {
        let agent = Arc::new(AgentClient::new(&config.agent)?);
        let recognizer = SpeechRecognizer::new(&config.stt)?;
        let synthesizer = SpeechSynthesizer::new(&config.tts)?;
        let playback = PlaybackController::new();
        let capture = CaptureController::new(config.capture.clone(), config.endpointing.clone());

        let mut session = ConversationSession::new(session_id, &config.agent.language);
        session.sign_in(token);

        let (events_tx, events_rx) = mpsc::channel(16);

        Ok(Self {
            config,
            session,
            agent,
            recognizer,
            synthesizer,
            playback,
            capture,
            events_tx,
            events_rx: Some(events_rx),
        })
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        println!("Signed in. Session {}", self.session.session_id);
        println!("Press Enter to talk (Enter again to stop listening).");
        println!("Type a message to send it directly, /lang <code> to switch language,");
        println!("/logout to end the session, /quit to exit.");

        // Agent greets first, as a spoken opening turn.
        let greeting = self.config.agent.greeting.clone();
        self.session.transcript.push(ChatMessage::agent(greeting.clone()));
        self.render_last();
        self.speak_reply(&greeting).await;

        let Some(mut events_rx) = self.events_rx.take() else {
            return Ok(());
        };

        let stdin = BufReader::new(tokio::io::stdin());
        let mut lines = stdin.lines();

        // Capture endpointing poll, same cadence as a device event loop.
        let mut auto_stop_interval =
            tokio::time::interval(tokio::time::Duration::from_millis(100));

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if !self.on_command(line.trim().to_string()).await {
                                break;
                            }
                        }
                        Ok(None) => {
                            info!("stdin closed");
                            break;
                        }
                        Err(e) => {
                            warn!("stdin error: {e}");
                            break;
                        }
                    }
                }
                _ = auto_stop_interval.tick() => {
                    if self.session.state == TurnState::Listening
                        && self.capture.should_auto_stop()
                    {
                        self.finish_capture().await;
                    }
                }
                event = events_rx.recv() => {
                    match event {
                        Some(TurnEvent::AgentReply { turn, result }) => {
                            self.on_agent_reply(turn, result).await;
                        }
                        None => {
                            warn!("Event channel closed");
                            break;
                        }
                    }
                }
            }

            self.flush_error();
        }

        self.playback.stop();
        Ok(())
    }

    /// Returns false when the loop should exit.
    async fn on_command(&mut self, line: String) -> bool {
        match line.as_str() {
            "" => self.on_mic_pressed(),
            "/quit" => return false,
            "/logout" => {
                self.playback.stop();
                self.session.sign_out();
                println!("Logged out.");
                return false;
            }
            _ if line.starts_with("/lang ") => {
                let code = line.trim_start_matches("/lang ").trim();
                self.session.select_language(code);
                println!("Language: {}", self.session.profile.label);
            }
            _ if line.starts_with('/') => {
                println!("Unknown command: {line}");
            }
            text => self.submit_user_utterance(text.to_string()),
        }
        true
    }

    /// Toggle the microphone. Opening the mic stops playback; toggling
    /// while listening stops and discards without submitting.
    fn on_mic_pressed(&mut self) {
        self.playback.stop();

        match self.session.state {
            TurnState::AwaitingSignIn => {
                self.session.set_error(ClientError::SignInFailed.to_string());
            }
            TurnState::AwaitingReply => {
                // Input is gated while a turn is in flight.
                info!("Ignoring mic press while awaiting reply");
            }
            TurnState::Listening => {
                let _ = self.capture.stop();
                self.session.state = TurnState::Ready;
                println!("(stopped listening)");
            }
            TurnState::Ready => {
                if let Err(e) = self.capture.open_stream() {
                    self.session.set_error(e.to_string());
                    return;
                }
                self.capture.start();
                self.session.state = TurnState::Listening;
                println!("(listening... pause to finish, Enter to cancel)");
            }
        }
    }

    /// Capture session ended by silence or the duration cap: recognize the
    /// held audio and, if non-empty, submit it as a new turn.
    async fn finish_capture(&mut self) {
        let samples = self.capture.stop();
        self.session.state = TurnState::Ready;

        if samples.is_empty()
            || CaptureController::is_silent(&samples, self.config.endpointing.threshold)
        {
            self.session
                .set_error(ClientError::RecognitionNoSpeech.to_string());
            return;
        }

        let Some(token) = self.session.token().map(str::to_string) else {
            return;
        };

        let result = self
            .recognizer
            .recognize(
                &token,
                &samples,
                self.capture.sample_rate(),
                self.session.profile.code,
            )
            .await;

        match result {
            Ok(text) if !text.trim().is_empty() => {
                self.submit_user_utterance(text);
            }
            Ok(_) => {
                self.session
                    .set_error(ClientError::RecognitionNoSpeech.to_string());
            }
            Err(e) => {
                self.session.set_error(e.to_string());
            }
        }
    }

    /// One conversational turn: optimistic user append, playback cancel,
    /// then the agent request in the background, tagged with a turn id.
    fn submit_user_utterance(&mut self, text: String) {
        // A new utterance may soon be spoken; avoid overlapping voices.
        self.playback.stop();

        let Some(turn) = self.session.begin_turn(&text) else {
            debug!("Turn refused in state {}", self.session.state);
            if self.session.state == TurnState::AwaitingReply {
                println!("(still waiting for the agent)");
            }
            return;
        };
        self.render_last();
        println!("(agent is thinking...)");

        let agent = Arc::clone(&self.agent);
        let token = self.session.token().unwrap_or_default().to_string();
        let session_id = self.session.session_id.clone();
        let language_code = self.session.profile.agent_code.to_string();
        let tx = self.events_tx.clone();

        tokio::spawn(async move {
            let result = agent
                .detect_intent(&token, &session_id, &text, &language_code)
                .await;
            if tx.send(TurnEvent::AgentReply { turn, result }).await.is_err() {
                warn!("Service loop gone, dropping reply for turn {turn}");
            }
        });
    }

    async fn on_agent_reply(&mut self, turn: u64, result: Result<String, ClientError>) {
        if let Some(reply) = self.session.complete_turn(turn, result) {
            self.render_last();
            self.speak_reply(&reply).await;
        } else if self.session.state == TurnState::Ready {
            // Failure path appended the generic agent entry.
            self.render_last();
        }
    }

    /// Outbound speech: normalize, guard, synthesize, play. Any failure
    /// surfaces as a transient error; the transcript entry stands.
    async fn speak_reply(&mut self, reply: &str) {
        let Some(token) = self.session.token().map(str::to_string) else {
            return;
        };

        let speakable = match normalize::prepare_reply_for_speech(
            reply,
            self.session.profile.code,
            &mut rand::thread_rng(),
        ) {
            Ok(text) => text,
            Err(e) => {
                self.session.set_error(e.to_string());
                return;
            }
        };

        if speakable.is_empty() {
            return;
        }

        match self
            .synthesizer
            .synthesize(&token, &speakable, self.session.profile)
            .await
        {
            Ok(audio) => {
                if let Err(e) = self.playback.play_mp3(audio) {
                    self.session.set_error(e.to_string());
                }
            }
            Err(e) => {
                self.session.set_error(e.to_string());
            }
        }
    }

    fn render_last(&self) {
        if let Some(message) = self.session.transcript.last() {
            let label = match message.sender {
                Sender::User => "You",
                Sender::Agent => "Agent",
            };
            let when = message.timestamp.format("%H:%M:%S");
            println!("[{when}] {label}: {}", message.text);
        }
    }

    fn flush_error(&mut self) {
        if let Some(message) = self.session.last_error.take() {
            println!("[error] {message}");
        }
    }
}
