//! The PUG session state machine.
//!
//! A session owns a queue of participants and walks the phase machine:
//! `Filling` until ten players are queued, then a ready check, team and map
//! selection, the running match and score submission, and back to
//! `Filling` (or a fresh ready check when the queue is still full).
//!
//! Every mutation happens under the session's core lock, which is never
//! held across an await point; the waits themselves (ready confirmations,
//! draft turns, polls, settlement) run in a spawned match-cycle task that
//! can be cancelled at any point by a queue drop or by `end()`.

use parking_lot::Mutex;
use rand::Rng;
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Notify, broadcast, watch};
use tokio_util::sync::CancellationToken;

use crate::application::events::{EventBus, SessionEvent};
use crate::application::menus::{
    ConfirmationMenu, PollMenu, SingleSelectionMenu, TurnBasedSelectionMenu, TurnBasedVetoMenu,
};
use crate::domain::{
    LoserPolicy, MATCH_SIZE, MapMethod, MapPool, MatchRecord, Participant, PugPhase, Score,
    ScoreError, SessionConfig, SessionError, SessionSettings, SubmitOutcome, TEAM_SIZE, TeamMethod,
    builtin_pools,
};
use crate::infra::channel::{ChannelId, Embed, InteractionChannel, MessageContent};
use crate::infra::store::SettingsStore;

const TEAM_ROLES: [&str; 2] = ["Blue Team", "Orange Team"];

struct SessionCore {
    phase: PugPhase,
    queue: Vec<Participant>,
    match_record: Option<MatchRecord>,
    cycle_cancel: Option<(u64, CancellationToken)>,
    cycle_seq: u64,
}

enum AfterMatch {
    /// The queue is still full; rest, then run another ready check.
    Requeue,
    /// Back to waiting for players.
    Filling,
}

pub struct PugSession {
    channel: Arc<dyn InteractionChannel>,
    owner: Participant,
    config: SessionConfig,
    core: Mutex<SessionCore>,
    settings_tx: watch::Sender<Option<SessionSettings>>,
    settled: Notify,
    events: EventBus,
    cancel: CancellationToken,
    // Self-handle for spawning the match cycle task.
    weak: std::sync::Weak<PugSession>,
}

impl PugSession {
    pub fn new(
        channel: Arc<dyn InteractionChannel>,
        owner: Participant,
        config: SessionConfig,
        events: EventBus,
    ) -> Arc<Self> {
        let (settings_tx, _) = watch::channel(None);
        Arc::new_cyclic(|weak| Self {
            channel,
            owner,
            config,
            core: Mutex::new(SessionCore {
                phase: PugPhase::Filling,
                queue: Vec::new(),
                match_record: None,
                cycle_cancel: None,
                cycle_seq: 0,
            }),
            settings_tx,
            settled: Notify::new(),
            events,
            cancel: CancellationToken::new(),
            weak: weak.clone(),
        })
    }

    /// The session is identified by the channel hosting it.
    pub fn id(&self) -> ChannelId {
        self.channel.id()
    }

    pub fn owner(&self) -> &Participant {
        &self.owner
    }

    pub fn phase(&self) -> PugPhase {
        self.core.lock().phase
    }

    pub fn is_ended(&self) -> bool {
        self.phase() == PugPhase::Ended
    }

    pub fn queue(&self) -> Vec<Participant> {
        self.core.lock().queue.clone()
    }

    pub fn queue_len(&self) -> usize {
        self.core.lock().queue.len()
    }

    pub fn is_queued(&self, member: &Participant) -> bool {
        self.core.lock().queue.contains(member)
    }

    /// Snapshot of the in-progress match, if one is running.
    pub fn current_match(&self) -> Option<MatchRecord> {
        self.core.lock().match_record.clone()
    }

    pub fn settings(&self) -> Option<SessionSettings> {
        self.settings_tx.borrow().clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Resolves once the session has been ended.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }

    /// Fixes the session settings. Settings are chosen exactly once; a
    /// second call is rejected.
    pub fn set_settings(&self, settings: SessionSettings) -> Result<(), SessionError> {
        let mut slot = Some(settings);
        let stored = self.settings_tx.send_if_modified(|cur| {
            if cur.is_none() {
                *cur = slot.take();
                true
            } else {
                false
            }
        });
        if stored {
            Ok(())
        } else {
            Err(SessionError::SettingsAlreadyChosen)
        }
    }

    /// Walks the owner through the four setup menus (map pool, team
    /// method, map method, loser policy). Each menu falls back to its
    /// first option on timeout. The chosen settings are fixed for the
    /// session's lifetime.
    pub async fn run_initial_setup(
        &self,
        store: &dyn SettingsStore,
    ) -> Result<SessionSettings, SessionError> {
        let pools = available_pools(store);
        let pool_names: Vec<String> = pools.iter().map(|p| p.name.clone()).collect();
        let pool_name = self
            .setup_choice(
                "Which map pool will be used?",
                "the map pool for this PUG",
                &pool_names,
            )
            .await?;
        let map_pool = pools
            .into_iter()
            .find(|p| p.name == pool_name)
            .ok_or_else(|| anyhow::anyhow!("chosen pool {pool_name} disappeared"))?;
        let team = self
            .setup_choice(
                "How will teams be determined?",
                "the method for selecting teams",
                &["Captains".into(), "Random".into()],
            )
            .await?;
        let map = self
            .setup_choice(
                "How will maps be determined?",
                "the method for selecting maps",
                &["Veto".into(), "Vote".into()],
            )
            .await?;
        let loser = self
            .setup_choice(
                "Will losers leave or stay after a match?",
                "what happens after a match",
                &["Losers Leave".into(), "Losers Stay".into()],
            )
            .await?;
        let settings = SessionSettings {
            map_pool,
            team_method: parse_choice::<TeamMethod>(&team)?,
            map_method: parse_choice::<MapMethod>(&map)?,
            loser_policy: parse_choice::<LoserPolicy>(&loser)?,
        };
        self.set_settings(settings.clone())?;
        log::debug!("settings chosen for {}: {settings:?}", self.id());
        Ok(settings)
    }

    async fn setup_choice(
        &self,
        title: &str,
        option_name: &str,
        options: &[String],
    ) -> Result<String, SessionError> {
        let mut menu = SingleSelectionMenu::new(
            self.channel.as_ref(),
            self.owner.clone(),
            title,
            option_name,
            options,
            self.config.setup_timeout,
        )?;
        match menu.run().await? {
            Some(choice) => Ok(choice),
            None => {
                let default = options[0].clone();
                menu.finish(&default).await;
                Ok(default)
            }
        }
    }

    /// Adds `member` to the queue. Rejected when they are already queued
    /// or playing in the current match. Crossing the match threshold while
    /// filling starts exactly one match cycle. Returns the queue length.
    pub async fn add_member(&self, member: Participant) -> Result<usize, SessionError> {
        let (len, start_cycle) = {
            let mut core = self.core.lock();
            if core.phase == PugPhase::Ended {
                return Err(SessionError::Ended);
            }
            if core.queue.contains(&member)
                || core
                    .match_record
                    .as_ref()
                    .is_some_and(|m| m.has_member(&member))
            {
                return Err(SessionError::AlreadyQueued(member.name.clone()));
            }
            core.queue.push(member.clone());
            let len = core.queue.len();
            let start_cycle = if len >= MATCH_SIZE && core.phase == PugPhase::Filling {
                core.phase = PugPhase::Readying;
                core.cycle_seq += 1;
                let token = self.cancel.child_token();
                core.cycle_cancel = Some((core.cycle_seq, token.clone()));
                Some((core.cycle_seq, token))
            } else {
                None
            };
            (len, start_cycle)
        };
        self.events.emit(SessionEvent::MemberJoined {
            session: self.id(),
            member: member.clone(),
            queue_len: len,
        });
        self.post(join_notice(&member, len)).await;
        if let Some((seq, token)) = start_cycle {
            self.events.emit(SessionEvent::QuorumReached { session: self.id() });
            if let Some(session) = self.weak.upgrade() {
                tokio::spawn(async move { session.match_cycle(token, seq).await });
            }
        }
        Ok(len)
    }

    /// Removes `member` from the queue, or kicks them from their team if
    /// they are mid-match. A queue drop below the match threshold during
    /// the ready check reverts the session to `Filling` and cancels the
    /// cycle in progress.
    pub async fn remove_member(&self, member: &Participant) -> Result<usize, SessionError> {
        enum Removal {
            Queue { reverted: bool },
            Team,
        }
        let (len, removal) = {
            let mut core = self.core.lock();
            if core.phase == PugPhase::Ended {
                return Err(SessionError::Ended);
            }
            if let Some(pos) = core.queue.iter().position(|p| p == member) {
                core.queue.remove(pos);
                let len = core.queue.len();
                let mut reverted = false;
                if core.phase == PugPhase::Readying && len < MATCH_SIZE {
                    core.phase = PugPhase::Filling;
                    if let Some((_, token)) = core.cycle_cancel.take() {
                        token.cancel();
                    }
                    reverted = true;
                }
                (len, Removal::Queue { reverted })
            } else if core
                .match_record
                .as_mut()
                .is_some_and(|m| m.remove_member(member))
            {
                (core.queue.len(), Removal::Team)
            } else {
                return Err(SessionError::NotInSession(member.name.clone()));
            }
        };
        self.events.emit(SessionEvent::MemberLeft {
            session: self.id(),
            member: member.clone(),
            queue_len: len,
        });
        match removal {
            Removal::Queue { reverted } => {
                self.post(leave_notice(member, len)).await;
                if reverted {
                    self.post("The ready check has been cancelled; waiting for more players.")
                        .await;
                }
            }
            Removal::Team => {
                log::warn!(
                    "{} was removed from the running match in {}",
                    member.name,
                    self.id()
                );
                self.post(format!(
                    "{} has been removed from the current match.",
                    member.mention()
                ))
                .await;
            }
        }
        Ok(len)
    }

    /// Records a score report from `reporter`'s team. The first report
    /// moves the match into `Submitting`; an agreeing report settles it.
    pub fn submit_score(
        &self,
        score: Score,
        reporter: &Participant,
    ) -> Result<SubmitOutcome, SessionError> {
        let outcome = {
            let mut core = self.core.lock();
            if core.phase == PugPhase::Ended {
                return Err(SessionError::Ended);
            }
            let record = core
                .match_record
                .as_mut()
                .ok_or(ScoreError::NoActiveMatch)?;
            let outcome = record.submit_score(score, reporter)?;
            if core.phase == PugPhase::MatchRunning {
                core.phase = PugPhase::Submitting;
            }
            outcome
        };
        if let SubmitOutcome::Settled(score) = outcome {
            log::debug!("score settled in {}: {score}", self.id());
            self.settled.notify_one();
        }
        Ok(outcome)
    }

    /// Ends the session. Terminal and idempotent: the second call is a
    /// no-op. Any in-progress wait is interrupted and its timers dropped.
    pub async fn end(&self) {
        let first = {
            let mut core = self.core.lock();
            if core.phase == PugPhase::Ended {
                false
            } else {
                core.phase = PugPhase::Ended;
                core.match_record = None;
                if let Some((_, token)) = core.cycle_cancel.take() {
                    token.cancel();
                }
                true
            }
        };
        if !first {
            return;
        }
        self.cancel.cancel();
        log::debug!("PUG ended in {}", self.id());
        self.events.emit(SessionEvent::SessionEnded { session: self.id() });
        self.post("The PUG here has been ended.").await;
    }

    // ---- match cycle -----------------------------------------------------

    async fn match_cycle(self: Arc<Self>, cancel: CancellationToken, seq: u64) {
        log::debug!("match cycle starting in {}", self.id());
        tokio::select! {
            _ = cancel.cancelled() => {
                log::debug!("match cycle cancelled in {}", self.id());
            }
            result = self.drive_cycle() => {
                match result {
                    Ok(()) => {}
                    Err(err) if self.is_ended() => {
                        log::debug!("match cycle stopped in {}: {err}", self.id());
                    }
                    Err(err) => {
                        log::error!("match cycle aborted in {}: {err}", self.id());
                        self.revert_to_filling();
                    }
                }
            }
        }
        let mut core = self.core.lock();
        if core.cycle_cancel.as_ref().is_some_and(|(s, _)| *s == seq) {
            core.cycle_cancel = None;
        }
    }

    async fn drive_cycle(&self) -> Result<(), SessionError> {
        let settings = self.settings_ready().await;
        loop {
            if !self.ready_up().await? {
                return Ok(());
            }
            let teams = self.select_teams(&settings).await?;
            let map = self.select_map(&settings, &teams).await?;
            self.start_match(teams, map).await?;
            let score = self.await_settlement().await;
            match self.finish_match(score, &settings).await? {
                AfterMatch::Filling => {
                    self.post_needed().await;
                    return Ok(());
                }
                AfterMatch::Requeue => {
                    self.post("There will now be a 1 minute break before the next match starts.")
                        .await;
                    tokio::time::sleep(self.config.rest_between_matches).await;
                    let restart = {
                        let mut core = self.core.lock();
                        if core.phase == PugPhase::Ended {
                            false
                        } else if core.queue.len() >= MATCH_SIZE {
                            core.phase = PugPhase::Readying;
                            true
                        } else {
                            core.phase = PugPhase::Filling;
                            false
                        }
                    };
                    if !restart {
                        self.post_needed().await;
                        return Ok(());
                    }
                    self.events.emit(SessionEvent::QuorumReached { session: self.id() });
                }
            }
        }
    }

    /// Runs ready confirmation rounds until the top ten all confirm
    /// (returns true) or the queue permanently drops below the match size
    /// (returns false, phase reverted to `Filling`). Players who do not
    /// confirm are kicked; late joiners refill the reopened slots and
    /// confirm in their own round.
    async fn ready_up(&self) -> Result<bool, SessionError> {
        let mut group: Vec<Participant> = {
            self.core.lock().queue.iter().take(MATCH_SIZE).cloned().collect()
        };
        if group.len() < MATCH_SIZE {
            // A leave can race the cycle spawn; the leaver already
            // reverted the phase.
            log::debug!("ready check skipped in {}: queue below match size", self.id());
            return Ok(false);
        }
        log::debug!("ready check starting in {}", self.id());
        self.post(format!(
            "{} it is time to ready up for the PUG!",
            mentions(&group)
        ))
        .await;
        loop {
            let menu = ConfirmationMenu::new(
                self.channel.as_ref(),
                group.clone(),
                "Ready Up",
                "ready up",
                self.config.ready_timeout,
            );
            let not_ready = menu.run().await?;
            if not_ready.is_empty() {
                return Ok(true);
            }
            let n_kicked = not_ready.len();
            let removed: Vec<Participant> = {
                let mut core = self.core.lock();
                not_ready
                    .iter()
                    .filter(|p| {
                        if let Some(pos) = core.queue.iter().position(|q| q == *p) {
                            core.queue.remove(pos);
                            true
                        } else {
                            false
                        }
                    })
                    .cloned()
                    .collect()
            };
            self.post(format!(
                "Not all players readied up; these players have been kicked:\n{}",
                not_ready
                    .iter()
                    .map(|p| p.name.clone())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
            .await;
            let len = self.queue_len();
            for member in removed {
                self.events.emit(SessionEvent::MemberLeft {
                    session: self.id(),
                    member,
                    queue_len: len,
                });
            }
            if len < MATCH_SIZE {
                self.revert_to_filling();
                self.post_needed().await;
                return Ok(false);
            }
            // Late joiners moved up into the kicked players' slots; only
            // they need to confirm.
            group = {
                self.core.lock().queue[MATCH_SIZE - n_kicked..MATCH_SIZE].to_vec()
            };
            log::debug!("refilling {n_kicked} spots in {}", self.id());
            self.post(format!(
                "{} since some players were kicked, you are now able to take their place in the PUG.",
                mentions(&group)
            ))
            .await;
        }
    }

    async fn select_teams(
        &self,
        settings: &SessionSettings,
    ) -> Result<[Vec<Participant>; 2], SessionError> {
        let players: Vec<Participant> = {
            let mut core = self.core.lock();
            if core.phase == PugPhase::Ended {
                return Err(SessionError::Ended);
            }
            core.phase = PugPhase::TeamSelection;
            core.queue.iter().take(MATCH_SIZE).cloned().collect()
        };
        if players.len() < MATCH_SIZE {
            return Err(SessionError::NotEnoughPlayers {
                needed: MATCH_SIZE,
                have: players.len(),
            });
        }
        match settings.team_method {
            TeamMethod::Random => {
                self.post("The teams are being randomised...").await;
                let mut shuffled = players;
                {
                    let mut rng = rand::thread_rng();
                    shuffled.shuffle(&mut rng);
                }
                let orange = shuffled.split_off(TEAM_SIZE);
                Ok([shuffled, orange])
            }
            TeamMethod::Captains => {
                let mut pool = players;
                let captains: [Participant; 2] = {
                    let mut rng = rand::thread_rng();
                    let first = pool.remove(rng.gen_range(0..pool.len()));
                    let second = pool.remove(rng.gen_range(0..pool.len()));
                    [first, second]
                };
                let options: Vec<String> = pool.iter().map(|p| p.name.clone()).collect();
                let mut menu = TurnBasedSelectionMenu::new(
                    self.channel.as_ref(),
                    captains.clone(),
                    "Captains pick teams",
                    "a player",
                    "captains",
                    &options,
                    self.config.turn_timeout,
                )?;
                let picks = menu.run().await?;
                let by_name: HashMap<&str, &Participant> =
                    pool.iter().map(|p| (p.name.as_str(), p)).collect();
                let mut teams: [Vec<Participant>; 2] = [Vec::new(), Vec::new()];
                for (idx, (captain, picked)) in captains.iter().zip(picks.iter()).enumerate() {
                    let mut team = Vec::with_capacity(TEAM_SIZE);
                    team.push(captain.clone());
                    team.extend(
                        picked
                            .iter()
                            .filter_map(|name| by_name.get(name.as_str()).map(|p| (*p).clone())),
                    );
                    teams[idx] = team;
                }
                Ok(teams)
            }
        }
    }

    async fn select_map(
        &self,
        settings: &SessionSettings,
        teams: &[Vec<Participant>; 2],
    ) -> Result<String, SessionError> {
        {
            let mut core = self.core.lock();
            if core.phase == PugPhase::Ended {
                return Err(SessionError::Ended);
            }
            core.phase = PugPhase::MapSelection;
        }
        let pool = &settings.map_pool;
        if pool.is_empty() {
            return Err(SessionError::EmptyMapPool(pool.name.clone()));
        }
        match settings.map_method {
            MapMethod::Veto => {
                let captains = [teams[0][0].clone(), teams[1][0].clone()];
                let mut menu = TurnBasedVetoMenu::new(
                    self.channel.as_ref(),
                    captains,
                    "Map veto",
                    "a map",
                    "captains",
                    &pool.maps,
                    1,
                    self.config.turn_timeout,
                )?;
                let mut picks = menu.run().await?;
                picks
                    .pop()
                    .ok_or_else(|| anyhow::anyhow!("map veto finished without a pick").into())
            }
            MapMethod::Vote => {
                let voters: Vec<Participant> = teams.iter().flatten().cloned().collect();
                let mut menu = PollMenu::new(
                    self.channel.as_ref(),
                    voters,
                    "Vote For Maps",
                    "a map",
                    &pool.maps,
                    self.config.vote_timeout,
                )?;
                Ok(menu.run().await?)
            }
        }
    }

    async fn start_match(
        &self,
        teams: [Vec<Participant>; 2],
        map: String,
    ) -> Result<(), SessionError> {
        {
            let mut core = self.core.lock();
            if core.phase == PugPhase::Ended {
                return Err(SessionError::Ended);
            }
            core.phase = PugPhase::MatchRunning;
            core.match_record = Some(MatchRecord::new(teams.clone(), map.clone()));
        }
        self.events.emit(SessionEvent::MatchStarted {
            session: self.id(),
            map,
            teams: teams.clone(),
        });
        self.post("The match is starting!").await;
        let grants = teams
            .iter()
            .zip(TEAM_ROLES)
            .flat_map(|(team, role)| team.iter().map(move |p| self.channel.grant_role(p, role)));
        for result in futures::future::join_all(grants).await {
            if let Err(err) = result {
                log::warn!("failed to grant a team role in {}: {err}", self.id());
            }
        }
        self.post_summary().await;
        Ok(())
    }

    async fn await_settlement(&self) -> Score {
        loop {
            let settled = {
                self.core
                    .lock()
                    .match_record
                    .as_ref()
                    .and_then(|m| m.settled_score())
            };
            if let Some(score) = settled {
                return score;
            }
            self.settled.notified().await;
        }
    }

    async fn finish_match(
        &self,
        score: Score,
        settings: &SessionSettings,
    ) -> Result<AfterMatch, SessionError> {
        let record = {
            self.core.lock().match_record.clone()
        }
        .ok_or(ScoreError::NoActiveMatch)?;
        self.events.emit(SessionEvent::MatchEnded {
            session: self.id(),
            score: Some(score),
        });
        self.post("The match has ended.").await;
        self.post_summary().await;
        let revokes = record
            .teams()
            .iter()
            .zip(TEAM_ROLES)
            .flat_map(|(team, role)| team.iter().map(move |p| self.channel.revoke_role(p, role)));
        for result in futures::future::join_all(revokes).await {
            if let Err(err) = result {
                log::warn!("failed to revoke a team role in {}: {err}", self.id());
            }
        }

        let losers_leave = settings.loser_policy == LoserPolicy::LosersLeave;
        let (after, removed) = {
            let mut core = self.core.lock();
            let mut removed = Vec::new();
            if losers_leave {
                if let Some(idx) = record.losing_team() {
                    let losers = &record.teams()[idx];
                    core.queue.retain(|p| {
                        if losers.contains(p) {
                            removed.push(p.clone());
                            false
                        } else {
                            true
                        }
                    });
                }
            }
            core.match_record = None;
            let after = if core.queue.len() >= MATCH_SIZE {
                // Phase stays at Submitting through the rest period so a
                // join during the break cannot start a second cycle.
                AfterMatch::Requeue
            } else {
                core.phase = PugPhase::Filling;
                AfterMatch::Filling
            };
            (after, removed)
        };
        if !removed.is_empty() {
            self.post(
                "Losers are being removed from the PUG, they may use `pug join` to rejoin the queue.",
            )
            .await;
            let len = self.queue_len();
            for member in removed {
                self.events.emit(SessionEvent::MemberLeft {
                    session: self.id(),
                    member,
                    queue_len: len,
                });
            }
        }
        Ok(after)
    }

    // ---- helpers ---------------------------------------------------------

    async fn settings_ready(&self) -> SessionSettings {
        let mut rx = self.settings_tx.subscribe();
        let value = rx
            .wait_for(|s| s.is_some())
            .await
            .expect("settings sender lives as long as the session");
        value.clone().expect("checked by wait_for")
    }

    fn revert_to_filling(&self) {
        let mut core = self.core.lock();
        if core.phase != PugPhase::Ended {
            core.phase = PugPhase::Filling;
        }
    }

    async fn post(&self, text: impl Into<String>) {
        if let Err(err) = self
            .channel
            .post_message(MessageContent::text(text))
            .await
        {
            log::warn!("channel delivery failed in {}: {err}", self.id());
        }
    }

    async fn post_needed(&self) {
        let len = self.queue_len();
        if len >= MATCH_SIZE {
            return;
        }
        let needed = MATCH_SIZE - len;
        self.post(format!(
            "{} more player{} needed to start the match!",
            needed,
            plural_are(needed)
        ))
        .await;
    }

    async fn post_summary(&self) {
        let Some(record) = self.current_match() else {
            return;
        };
        let mut embed = Embed::new("Match Summary", self.id().to_string())
            .field("Map", record.map())
            .field("Blue Team", team_lines(&record.teams()[0]))
            .field("Orange Team", team_lines(&record.teams()[1]));
        if !record.reports(0).is_empty() || !record.reports(1).is_empty() {
            let value = match record.settled_score() {
                Some(score) => score.to_string(),
                None => {
                    "Still waiting on a player from each team to enter a matching score."
                        .to_string()
                }
            };
            embed = embed.field("Score", value);
        }
        if let Err(err) = self.channel.post_message(MessageContent::embed(embed)).await {
            log::warn!("summary delivery failed in {}: {err}", self.id());
        }
    }
}

/// Built-in pools plus any pools configured in the settings store.
pub fn available_pools(store: &dyn SettingsStore) -> Vec<MapPool> {
    let mut pools = builtin_pools();
    if let Some(value) = store.get("map_pools") {
        match serde_json::from_value::<Vec<MapPool>>(value) {
            Ok(extra) => pools.extend(extra),
            Err(err) => log::warn!("ignoring malformed map_pools entry: {err}"),
        }
    }
    pools
}

fn parse_choice<T: std::str::FromStr<Err = String>>(choice: &str) -> Result<T, SessionError> {
    choice
        .parse::<T>()
        .map_err(|err| SessionError::OperationFailed(anyhow::anyhow!(err)))
}

fn mentions(players: &[Participant]) -> String {
    players
        .iter()
        .map(|p| p.mention())
        .collect::<Vec<_>>()
        .join(", ")
}

fn team_lines(team: &[Participant]) -> String {
    team.iter()
        .map(|p| format!("+ {}", p.name))
        .collect::<Vec<_>>()
        .join("\n")
}

fn plural_are(n: usize) -> &'static str {
    if n == 1 { " is" } else { "s are" }
}

fn join_notice(member: &Participant, len: usize) -> String {
    if len < MATCH_SIZE {
        let needed = MATCH_SIZE - len;
        format!(
            "{} has joined the PUG, {} more player{} needed to start the match!",
            member.mention(),
            needed,
            plural_are(needed)
        )
    } else if len == MATCH_SIZE {
        format!(
            "{} is the 10th player in the PUG, a match will start now!",
            member.mention()
        )
    } else {
        format!(
            "{} has joined the PUG and is at position {} in the queue.",
            member.mention(),
            len - MATCH_SIZE
        )
    }
}

fn leave_notice(member: &Participant, len: usize) -> String {
    if len < MATCH_SIZE {
        let needed = MATCH_SIZE - len;
        format!(
            "{} has left the PUG, {} more player{} now needed to start the match.",
            member.mention(),
            needed,
            plural_are(needed)
        )
    } else {
        format!("{} has left the PUG.", member.mention())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::memory_channel::{AutoResponder, MemoryChannel};
    use crate::infra::store::MemoryStore;

    fn player(id: u64) -> Participant {
        Participant::new(id, format!("player-{id}"))
    }

    fn settings() -> SessionSettings {
        SessionSettings {
            map_pool: MapPool::new("Duo", vec!["Bank".into(), "Oregon".into()]),
            team_method: TeamMethod::Random,
            map_method: MapMethod::Vote,
            loser_policy: LoserPolicy::LosersLeave,
        }
    }

    fn session() -> (Arc<PugSession>, Arc<MemoryChannel>) {
        let channel = MemoryChannel::new("pug-1");
        let session = PugSession::new(
            channel.clone(),
            player(1),
            SessionConfig::default(),
            EventBus::default(),
        );
        (session, channel)
    }

    #[tokio::test]
    async fn test_queue_has_no_duplicates() {
        let (session, _channel) = session();
        assert_eq!(session.add_member(player(1)).await.unwrap(), 1);
        assert!(matches!(
            session.add_member(player(1)).await,
            Err(SessionError::AlreadyQueued(_))
        ));
        assert_eq!(session.queue_len(), 1);
    }

    #[tokio::test]
    async fn test_remove_requires_membership() {
        let (session, _channel) = session();
        assert!(matches!(
            session.remove_member(&player(9)).await,
            Err(SessionError::NotInSession(_))
        ));
        session.add_member(player(2)).await.unwrap();
        assert_eq!(session.remove_member(&player(2)).await.unwrap(), 0);
        assert!(matches!(
            session.remove_member(&player(2)).await,
            Err(SessionError::NotInSession(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tenth_member_starts_exactly_one_cycle() {
        let (session, _channel) = session();
        let mut events = session.subscribe();
        for id in 1..=10 {
            session.add_member(player(id)).await.unwrap();
        }
        assert_eq!(session.phase(), PugPhase::Readying);
        // An eleventh join while readying must not start a second cycle.
        session.add_member(player(11)).await.unwrap();
        let mut quorums = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, SessionEvent::QuorumReached { .. }) {
                quorums += 1;
            }
        }
        assert_eq!(quorums, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_leave_during_ready_check_reverts_to_filling() {
        let (session, _channel) = session();
        session.set_settings(settings()).unwrap();
        for id in 1..=10 {
            session.add_member(player(id)).await.unwrap();
        }
        assert_eq!(session.phase(), PugPhase::Readying);
        session.remove_member(&player(4)).await.unwrap();
        assert_eq!(session.phase(), PugPhase::Filling);
        assert_eq!(session.queue_len(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ready_timeout_kicks_and_reverts() {
        let (session, channel) = session();
        session.set_settings(settings()).unwrap();
        // Nobody confirms: the whole group is kicked and the session goes
        // back to filling with an empty queue.
        for id in 1..=10 {
            session.add_member(player(id)).await.unwrap();
        }
        let mut events = session.subscribe();
        tokio::time::sleep(std::time::Duration::from_secs(120)).await;
        assert_eq!(session.phase(), PugPhase::Filling);
        assert_eq!(session.queue_len(), 0);
        let mut left = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, SessionEvent::MemberLeft { .. }) {
                left += 1;
            }
        }
        assert_eq!(left, 10);
        assert!(
            channel
                .transcript()
                .iter()
                .any(|m| m.contains("have been kicked"))
        );
    }

    #[tokio::test]
    async fn test_settings_round_trip_and_immutability() {
        let (session, _channel) = session();
        let chosen = settings();
        session.set_settings(chosen.clone()).unwrap();
        assert_eq!(session.settings(), Some(chosen.clone()));
        assert!(matches!(
            session.set_settings(chosen.clone()),
            Err(SessionError::SettingsAlreadyChosen)
        ));
        assert_eq!(session.settings(), Some(chosen));
    }

    #[tokio::test]
    async fn test_end_is_idempotent() {
        let (session, _channel) = session();
        let mut events = session.subscribe();
        session.end().await;
        session.end().await;
        assert!(session.is_ended());
        let mut ended = 0;
        while let Ok(event) = events.try_recv() {
            if matches!(event, SessionEvent::SessionEnded { .. }) {
                ended += 1;
            }
        }
        assert_eq!(ended, 1);
        assert!(matches!(
            session.add_member(player(3)).await,
            Err(SessionError::Ended)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cycle_settles_and_losers_leave() {
        let (session, channel) = session();
        AutoResponder::new(channel.clone()).spawn();
        session.set_settings(settings()).unwrap();
        let mut events = session.subscribe();
        for id in 1..=10 {
            session.add_member(player(id)).await.unwrap();
        }
        // Everyone confirms and votes; wait for the match to start.
        let teams = loop {
            match events.recv().await.unwrap() {
                SessionEvent::MatchStarted { teams, .. } => break teams,
                _ => continue,
            }
        };
        assert_eq!(session.phase(), PugPhase::MatchRunning);
        session
            .submit_score(Score::new(13, 7), &teams[0][0])
            .unwrap();
        assert_eq!(session.phase(), PugPhase::Submitting);
        let outcome = session
            .submit_score(Score::new(7, 13), &teams[1][0])
            .unwrap();
        assert_eq!(outcome, SubmitOutcome::Settled(Score::new(13, 7)));
        loop {
            if let SessionEvent::MatchEnded { score, .. } = events.recv().await.unwrap() {
                assert_eq!(score, Some(Score::new(13, 7)));
                break;
            }
        }
        // Give the cycle task a tick to apply the loser policy.
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        assert_eq!(session.queue_len(), 5);
        assert_eq!(session.phase(), PugPhase::Filling);
        for loser in &teams[1] {
            assert!(!session.is_queued(loser));
        }
    }

    #[test]
    fn test_available_pools_merges_store() {
        let store = MemoryStore::new();
        store
            .set(
                "map_pools",
                serde_json::json!([{ "name": "Customs", "maps": ["Bank"] }]),
            )
            .unwrap();
        let pools = available_pools(&store);
        assert_eq!(pools.len(), 3);
        assert_eq!(pools[2].name, "Customs");
    }
}
