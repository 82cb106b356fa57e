//! Agent orchestration: session commands in, synchronized speech and motion out
//!
//! Every character owns a slot holding its animation state, the audio it is
//! currently playing and a generation counter. A new turn bumps the
//! generation before anything suspends; every deferred completion (speech
//! resolution, the end-of-speech timer) compares its generation against the
//! slot and gives up when a newer turn has started.

use agora_anim::{AnimationMode, CharacterAnimationState, MouthSource};
use agora_core::{Error, ParameterSnapshot, Result, Roster};
use agora_session::{Command, InteractClient, InteractResponse, SessionChannel};
use agora_spk::{AudioSource, ResolvedAudio, SpeechAudioResolver, Utterance};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Notifications for whoever drives the stage
#[derive(Debug, Clone, PartialEq)]
pub enum StageEvent {
    /// Speech resolved and playback started
    SpeakingStarted {
        character_id: String,
        source: AudioSource,
        duration: Duration,
    },
    /// The speaking duration elapsed
    SpeakingFinished { character_id: String },
    /// A turn produced no audio; the character stays idle
    NoAudio { character_id: String, reason: String },
    /// A command addressed a character that is not on stage
    UnknownCharacter { character_id: String },
    /// The service opened a debate
    DebateStarted { debate_id: Option<String> },
    /// The conversation service reported an error
    ServiceError { message: String },
}

/// How a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Speaking { source: AudioSource, duration: Duration },
    /// A newer turn for the same character started first
    Superseded,
    NoAudio,
}

/// Animation timestamps follow the tokio clock so timers and poses agree
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

struct Slot {
    anim: CharacterAnimationState,
    generation: u64,
    playing: Option<ResolvedAudio>,
    idle_timer: Option<JoinHandle<()>>,
}

impl Slot {
    /// Stop current audio and any pending end-of-speech timer
    fn silence(&mut self) {
        if let Some(audio) = self.playing.take() {
            audio.handle.stop();
        }
        if let Some(timer) = self.idle_timer.take() {
            timer.abort();
        }
    }
}

struct Inner {
    roster: Roster,
    resolver: SpeechAudioResolver,
    slots: Mutex<BTreeMap<String, Slot>>,
    events: broadcast::Sender<StageEvent>,
}

impl Inner {
    fn emit(&self, event: StageEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

/// Drives every character on stage. Cloning shares the same stage.
#[derive(Clone)]
pub struct AgentOrchestrator {
    inner: Arc<Inner>,
}

impl AgentOrchestrator {
    pub fn new(roster: Roster, resolver: SpeechAudioResolver) -> Self {
        let started = now();
        let slots = roster
            .iter()
            .map(|character| {
                let anim = CharacterAnimationState::new(
                    character,
                    roster.animation_for(&character.id),
                    started,
                );
                let slot = Slot {
                    anim,
                    generation: 0,
                    playing: None,
                    idle_timer: None,
                };
                (character.id.clone(), slot)
            })
            .collect();
        let (events, _) = broadcast::channel(256);

        info!(characters = roster.len(), "orchestrator ready");
        Self {
            inner: Arc::new(Inner {
                roster,
                resolver,
                slots: Mutex::new(slots),
                events,
            }),
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.inner.roster
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StageEvent> {
        self.inner.events.subscribe()
    }

    /// Route every command from `channel` to this stage
    pub fn attach(&self, channel: &SessionChannel) {
        let stage = self.clone();
        channel.attach_handler(move |command| stage.handle_command(command));
    }

    /// React to one inbound command. Turns are resolved on spawned tasks; the
    /// generation is claimed here so arrival order decides which turn wins.
    pub fn handle_command(&self, command: Command) {
        match command {
            Command::TurnStart(turn) => {
                let generation = match self.begin_turn(&turn.character_id) {
                    Ok(generation) => generation,
                    Err(e) => {
                        warn!(error = %e, "ignoring turn");
                        return;
                    }
                };
                debug!(
                    character = %turn.character_id,
                    debate = ?turn.debate_id,
                    turn = ?turn.turn,
                    "turn started"
                );
                let utterance = Utterance::from_base64(turn.text, turn.audio_b64.as_deref());
                let character_id = turn.character_id;
                let stage = self.clone();
                tokio::spawn(async move {
                    stage.complete_turn(&character_id, generation, utterance).await;
                });
            }
            Command::SessionClosed { reason } => {
                info!(reason = ?reason, "session closed by service");
                self.stop_all();
            }
            Command::DebateStarted(debate) => {
                info!(
                    debate = ?debate.debate_id,
                    topic = ?debate.topic,
                    characters = ?debate.characters,
                    "debate started"
                );
                self.inner.emit(StageEvent::DebateStarted {
                    debate_id: debate.debate_id,
                });
            }
            Command::Error { message } => {
                warn!(message = %message, "service reported an error");
                self.inner.emit(StageEvent::ServiceError { message });
            }
            Command::Other { kind, .. } => debug!(kind = %kind, "ignoring command"),
        }
    }

    /// Perform one utterance for `character_id`, superseding whatever the
    /// character was doing.
    pub async fn start_turn(&self, character_id: &str, utterance: Utterance) -> Result<TurnOutcome> {
        let generation = self.begin_turn(character_id)?;
        Ok(self.complete_turn(character_id, generation, utterance).await)
    }

    /// Claim a new generation: stop current audio, cancel the pending idle
    /// transition and return the character to idle.
    fn begin_turn(&self, character_id: &str) -> Result<u64> {
        let mut slots = self.inner.slots.lock();
        match slots.get_mut(character_id) {
            Some(slot) => {
                slot.generation += 1;
                slot.silence();
                slot.anim.enter_idle(now());
                Ok(slot.generation)
            }
            None => {
                self.inner.emit(StageEvent::UnknownCharacter {
                    character_id: character_id.to_string(),
                });
                Err(Error::UnknownCharacter(character_id.to_string()))
            }
        }
    }

    async fn complete_turn(&self, character_id: &str, generation: u64, utterance: Utterance) -> TurnOutcome {
        let resolved = self.inner.resolver.resolve(&utterance).await;

        let audio = {
            let mut slots = self.inner.slots.lock();
            let slot = match slots.get_mut(character_id) {
                Some(slot) if slot.generation == generation => slot,
                _ => {
                    if let Ok(audio) = resolved {
                        audio.handle.stop();
                    }
                    debug!(character = character_id, generation, "discarding stale speech");
                    return TurnOutcome::Superseded;
                }
            };
            match resolved {
                Ok(audio) => audio,
                Err(e) => {
                    slot.anim.enter_idle(now());
                    drop(slots);
                    return self.report_no_audio(character_id, e.to_string());
                }
            }
        };

        // starting a device may block; frames must keep flowing meanwhile
        if let Err(e) = audio.handle.play() {
            audio.handle.stop();
            if !self.is_current(character_id, generation) {
                return TurnOutcome::Superseded;
            }
            return self.report_no_audio(character_id, e.to_string());
        }

        let duration = audio.duration;
        let source = audio.source;
        {
            let mut slots = self.inner.slots.lock();
            let slot = match slots.get_mut(character_id) {
                Some(slot) if slot.generation == generation => slot,
                _ => {
                    audio.handle.stop();
                    debug!(character = character_id, generation, "turn superseded while starting playback");
                    return TurnOutcome::Superseded;
                }
            };
            slot.anim
                .enter_speaking(duration, MouthSource::from_envelope(audio.envelope.clone()), now());
            slot.playing = Some(audio);
            slot.idle_timer = Some(tokio::spawn(finish_speaking(
                self.inner.clone(),
                character_id.to_string(),
                generation,
                duration,
            )));
        }

        info!(
            character = character_id,
            source = %source,
            duration_ms = duration.as_millis() as u64,
            "speaking"
        );
        self.inner.emit(StageEvent::SpeakingStarted {
            character_id: character_id.to_string(),
            source,
            duration,
        });
        TurnOutcome::Speaking { source, duration }
    }

    fn is_current(&self, character_id: &str, generation: u64) -> bool {
        self.inner
            .slots
            .lock()
            .get(character_id)
            .map(|slot| slot.generation == generation)
            .unwrap_or(false)
    }

    fn report_no_audio(&self, character_id: &str, reason: String) -> TurnOutcome {
        warn!(character = character_id, reason = %reason, "turn produced no audio");
        self.inner.emit(StageEvent::NoAudio {
            character_id: character_id.to_string(),
            reason,
        });
        TurnOutcome::NoAudio
    }

    /// Silence one character and invalidate its in-flight turn
    pub fn stop_character(&self, character_id: &str) -> bool {
        let mut slots = self.inner.slots.lock();
        match slots.get_mut(character_id) {
            Some(slot) => {
                slot.generation += 1;
                slot.silence();
                slot.anim.enter_idle(now());
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&self) {
        let mut slots = self.inner.slots.lock();
        let at = now();
        for slot in slots.values_mut() {
            slot.generation += 1;
            slot.silence();
            slot.anim.enter_idle(at);
        }
        debug!(characters = slots.len(), "all characters stopped");
    }

    pub fn mode(&self, character_id: &str) -> Option<AnimationMode> {
        let slots = self.inner.slots.lock();
        slots.get(character_id).map(|slot| slot.anim.mode(now()))
    }

    /// Whether audio attributed to the character is still playing
    pub fn is_playing(&self, character_id: &str) -> bool {
        let slots = self.inner.slots.lock();
        slots
            .get(character_id)
            .and_then(|slot| slot.playing.as_ref())
            .map(|audio| audio.handle.is_playing())
            .unwrap_or(false)
    }

    pub fn snapshot(&self, character_id: &str) -> Option<ParameterSnapshot> {
        let mut slots = self.inner.slots.lock();
        slots.get_mut(character_id).map(|slot| slot.anim.snapshot(now()))
    }

    /// Parameters of every character at one instant, in id order
    pub fn snapshots(&self) -> Vec<(String, ParameterSnapshot)> {
        let mut slots = self.inner.slots.lock();
        let at = now();
        slots
            .iter_mut()
            .map(|(id, slot)| (id.clone(), slot.anim.snapshot(at)))
            .collect()
    }

    /// Ask the interaction endpoint and perform the reply as `character_id`
    pub async fn perform_interaction(
        &self,
        client: &InteractClient,
        session_id: &str,
        user_input: &str,
        character_id: &str,
    ) -> Result<(InteractResponse, TurnOutcome)> {
        self.inner.roster.require(character_id)?;
        let response = client.interact(session_id, user_input).await?;
        let utterance =
            Utterance::from_base64(response.text_response.clone(), response.audio_b64.as_deref());
        let outcome = self.start_turn(character_id, utterance).await?;
        Ok((response, outcome))
    }
}

async fn finish_speaking(inner: Arc<Inner>, character_id: String, generation: u64, duration: Duration) {
    tokio::time::sleep(duration).await;

    let mut slots = inner.slots.lock();
    let slot = match slots.get_mut(&character_id) {
        Some(slot) if slot.generation == generation => slot,
        _ => return,
    };
    slot.idle_timer = None;
    slot.anim.enter_idle(now());
    drop(slots);

    debug!(character = %character_id, "speaking finished");
    inner.emit(StageEvent::SpeakingFinished { character_id });
}
