//! The beacon orchestrator.
//!
//! A cooperative state machine: [`BeaconService::tick`] runs exactly one
//! state handler and reports when it wants to run again. Handlers never wait
//! on the network; RPCs return a [`PendingPromise`] that a later tick polls.
//!
//! ```text
//! BuildAeonKeys -> RequestSecretKey -> WaitForSecretKey -> BroadcastSignature
//!       |                                                        ^      |
//!       +------------------- (dealer) ---------------------------+      v
//!                                                Complete <- CollectSignatures
//! ```

use crate::cabinet::{derive_member_id, Cabinet, CabinetError};
use crate::entropy::{EntropyError, EntropyGenerator};
use crate::error::Error;
use crate::round::{Entropy, Round, RoundError, RoundStore};
use crate::rpc::{
    BeaconRpc, RegisterRequest, RegisterResponse, RpcOp, SecretRequest, SecretResponse,
    SignatureSubmission,
};
use beacon_config::BeaconSettings;
use beacon_crypto::{sign, MasterKeyPolynomial, MemberId, PublicKey, SecretShare};
use beacon_logging::{critical, debug, info, trace, warn};
use beacon_networking::{
    types::{deserialize, serialize},
    MemberAddress, PendingPromise, PromiseState, RpcTransport,
};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;

/// Submissions held for future rounds beyond this many are dropped.
pub const MAX_QUEUED_SUBMISSIONS: usize = 4096;

const ALARM_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BeaconState {
    BuildAeonKeys,
    RequestSecretKey,
    WaitForSecretKey,
    BroadcastSignature,
    CollectSignatures,
    Complete,
}

impl fmt::Display for BeaconState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BeaconState::BuildAeonKeys => "BUILD_AEON_KEYS",
            BeaconState::RequestSecretKey => "REQUEST_SECRET_KEY",
            BeaconState::WaitForSecretKey => "WAIT_FOR_SECRET_KEY",
            BeaconState::BroadcastSignature => "BROADCAST_SIGNATURE",
            BeaconState::CollectSignatures => "COLLECT_SIGNATURES",
            BeaconState::Complete => "COMPLETE",
        };
        f.write_str(name)
    }
}

/// When the driver should run the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Immediately,
    After(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub state: BeaconState,
    pub wake: Wake,
}

impl Transition {
    fn now(state: BeaconState) -> Self {
        Self {
            state,
            wake: Wake::Immediately,
        }
    }

    fn after(state: BeaconState, delay: Duration) -> Self {
        Self {
            state,
            wake: Wake::After(delay),
        }
    }
}

/// Cabinet-wide faults surfaced to the consuming layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BeaconAlarm {
    /// A quorum of individually valid shares recovered a signature that does
    /// not verify against the shared key.
    AggregateVerificationFailed { round: u64 },
}

#[derive(Default)]
struct KeyMaterial {
    secret_share: Option<SecretShare>,
    share_public_key: Option<PublicKey>,
    shared_public_key: Option<PublicKey>,
    /// Dealer only: the share of every member, by id.
    dealt: BTreeMap<MemberId, SecretShare>,
}

struct Progress {
    state: BeaconState,
    next_round_to_produce: u64,
    pending_secret: Option<PendingPromise<Vec<u8>>>,
}

pub struct BeaconService<T> {
    address: MemberAddress,
    id: MemberId,
    settings: BeaconSettings,
    transport: T,
    cabinet: RwLock<Arc<Cabinet>>,
    keys: Mutex<KeyMaterial>,
    submissions: Mutex<VecDeque<SignatureSubmission>>,
    rounds: Mutex<RoundStore>,
    progress: Mutex<Progress>,
    registered: Mutex<BTreeSet<MemberAddress>>,
    alarms: broadcast::Sender<BeaconAlarm>,
    wake: Notify,
}

impl<T: RpcTransport> BeaconService<T> {
    pub fn new(settings: BeaconSettings, transport: T) -> Result<Self, Error> {
        let cabinet = Cabinet::from_settings(&settings)?;
        if !cabinet.contains(&settings.address) {
            return Err(CabinetError::UnknownMember(settings.address).into());
        }

        let (alarms, _) = broadcast::channel(ALARM_CAPACITY);
        Ok(Self {
            address: settings.address.clone(),
            id: derive_member_id(&settings.address),
            rounds: Mutex::new(RoundStore::new(settings.retention_window)),
            settings,
            transport,
            cabinet: RwLock::new(Arc::new(cabinet)),
            keys: Mutex::new(KeyMaterial::default()),
            submissions: Mutex::new(VecDeque::new()),
            progress: Mutex::new(Progress {
                state: BeaconState::BuildAeonKeys,
                next_round_to_produce: 0,
                pending_secret: None,
            }),
            registered: Mutex::new(BTreeSet::new()),
            alarms,
            wake: Notify::new(),
        })
    }

    #[must_use]
    pub fn address(&self) -> &MemberAddress {
        &self.address
    }

    #[must_use]
    pub fn id(&self) -> MemberId {
        self.id
    }

    #[must_use]
    pub fn cabinet(&self) -> Arc<Cabinet> {
        Arc::clone(&self.cabinet.read())
    }

    /// Swap in a new cabinet. In-flight rounds keep their collected shares.
    ///
    /// The dealt key stays in use, so the new cabinet must keep this node,
    /// the dealer and the threshold.
    pub fn reset_cabinet(&self, cabinet: Cabinet) -> Result<(), CabinetError> {
        let current = self.cabinet();
        if !cabinet.contains(&self.address) {
            return Err(CabinetError::UnknownMember(self.address.clone()));
        }
        if cabinet.threshold() != current.threshold() || cabinet.dealer() != current.dealer() {
            return Err(CabinetError::KeyChange {
                threshold: cabinet.threshold(),
                dealer: cabinet.dealer().clone(),
            });
        }

        self.registered
            .lock()
            .retain(|address| cabinet.contains(address));
        *self.cabinet.write() = Arc::new(cabinet);
        Ok(())
    }

    #[must_use]
    pub fn is_dealer(&self) -> bool {
        self.cabinet().is_dealer(&self.address)
    }

    #[must_use]
    pub fn state(&self) -> BeaconState {
        self.progress.lock().state
    }

    #[must_use]
    pub fn next_round_to_produce(&self) -> u64 {
        self.progress.lock().next_round_to_produce
    }

    #[must_use]
    pub fn next_round_to_consume(&self) -> u64 {
        self.rounds.lock().next_to_consume()
    }

    #[must_use]
    pub fn has_secret_share(&self) -> bool {
        self.keys.lock().secret_share.is_some()
    }

    #[must_use]
    pub fn shared_public_key(&self) -> Option<PublicKey> {
        self.keys.lock().shared_public_key
    }

    /// Entropy of a retained, signed round. Does not move the consumption pointer.
    #[must_use]
    pub fn round_entropy(&self, round: u64) -> Option<Entropy> {
        self.rounds.lock().entropy(round).ok()
    }

    /// `(round, member)` of every submission waiting to be processed.
    #[must_use]
    pub fn queued_submissions(&self) -> Vec<(u64, MemberId)> {
        self.submissions
            .lock()
            .iter()
            .map(|s| (s.round, s.member_id))
            .collect()
    }

    /// Addresses whose registration was accepted.
    #[must_use]
    pub fn registered_members(&self) -> BTreeSet<MemberAddress> {
        self.registered.lock().clone()
    }

    /// Subscribe to cabinet-wide fault alarms.
    #[must_use]
    pub fn subscribe_alarms(&self) -> broadcast::Receiver<BeaconAlarm> {
        self.alarms.subscribe()
    }

    /// Run one state handler.
    pub fn tick(&self) -> Transition {
        let mut progress = self.progress.lock();
        let current = progress.state;

        let transition = match current {
            BeaconState::BuildAeonKeys => self.build_aeon_keys(),
            BeaconState::RequestSecretKey => self.request_secret_key(&mut progress),
            BeaconState::WaitForSecretKey => self.wait_for_secret_key(&mut progress),
            BeaconState::BroadcastSignature => self.broadcast_signature(&progress),
            BeaconState::CollectSignatures => self.collect_signatures(&mut progress),
            BeaconState::Complete => self.complete(&progress),
        };

        if transition.state != current {
            debug!(
                "{} {} -> {} (round {})",
                self.address, current, transition.state, progress.next_round_to_produce
            );
        }
        progress.state = transition.state;
        transition
    }

    /// Drive the state machine until `shutdown` fires. Delayed wakes are cut
    /// short by incoming submissions and by consumption.
    pub async fn run(&self, shutdown: CancellationToken) {
        info!("{} starting beacon", self.address);
        loop {
            if shutdown.is_cancelled() {
                break;
            }

            match self.tick().wake {
                Wake::Immediately => tokio::task::yield_now().await,
                Wake::After(delay) => {
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        () = tokio::time::sleep(delay) => {}
                        () = self.wake.notified() => {}
                    }
                }
            }
        }
        info!("{} beacon stopped", self.address);
    }

    fn build_aeon_keys(&self) -> Transition {
        let cabinet = self.cabinet();
        if !cabinet.is_dealer(&self.address) {
            return Transition::now(BeaconState::RequestSecretKey);
        }

        match Self::deal(&cabinet) {
            Ok((shared_public_key, dealt)) => {
                let mut keys = self.keys.lock();
                let own = dealt.get(&self.id).cloned();
                keys.share_public_key = own.as_ref().map(SecretShare::public_key);
                keys.secret_share = own;
                keys.shared_public_key = Some(shared_public_key);
                keys.dealt = dealt;
                info!(
                    "{} dealt {} shares with threshold {}",
                    self.address,
                    keys.dealt.len(),
                    cabinet.threshold()
                );
                Transition::now(BeaconState::BroadcastSignature)
            }
            Err(e) => {
                warn!("{} failed to build keys: {}", self.address, e);
                Transition::after(BeaconState::BuildAeonKeys, self.settings.retry_delay)
            }
        }
    }

    fn deal(cabinet: &Cabinet) -> Result<(PublicKey, BTreeMap<MemberId, SecretShare>), Error> {
        let polynomial = MasterKeyPolynomial::generate(cabinet.threshold(), &mut rand::thread_rng())?;
        let dealt = cabinet
            .members()
            .map(|member| Ok((member.id(), polynomial.derive_share(&member.id())?)))
            .collect::<Result<BTreeMap<_, _>, Error>>()?;
        Ok((polynomial.shared_public_key(), dealt))
    }

    fn request_secret_key(&self, progress: &mut Progress) -> Transition {
        let dealer = self.cabinet().dealer().clone();
        let request = SecretRequest {
            address: self.address.clone(),
        };

        match serialize(&request) {
            Ok(payload) => {
                trace!("{} requesting secret share from {}", self.address, dealer);
                progress.pending_secret = Some(self.transport.call_specific_address(
                    &dealer,
                    RpcOp::RequestSecret.into(),
                    payload,
                    self.settings.rpc_timeout,
                ));
                Transition::now(BeaconState::WaitForSecretKey)
            }
            Err(e) => {
                warn!("{} could not encode secret request: {}", self.address, e);
                Transition::after(BeaconState::RequestSecretKey, self.settings.retry_delay)
            }
        }
    }

    fn wait_for_secret_key(&self, progress: &mut Progress) -> Transition {
        let Some(pending) = progress.pending_secret.as_mut() else {
            return Transition::now(BeaconState::RequestSecretKey);
        };

        let outcome = match pending.poll() {
            PromiseState::Waiting => {
                return Transition::after(
                    BeaconState::WaitForSecretKey,
                    self.settings.poll_interval,
                );
            }
            PromiseState::Success(bytes) => deserialize::<SecretResponse>(&bytes)
                .map_err(|e| e.to_string())
                .and_then(|response| self.adopt_secret(response)),
            PromiseState::Failed(reason) => Err(reason),
            PromiseState::TimedOut => Err("timed out".to_string()),
        };
        progress.pending_secret = None;

        match outcome {
            Ok(()) => {
                info!("{} received its secret share", self.address);
                Transition::now(BeaconState::BroadcastSignature)
            }
            Err(reason) => {
                warn!(
                    "{} secret share request failed ({}), retrying",
                    self.address, reason
                );
                Transition::after(BeaconState::RequestSecretKey, self.settings.retry_delay)
            }
        }
    }

    fn adopt_secret(&self, response: SecretResponse) -> Result<(), String> {
        let SecretResponse {
            success: true,
            secret_share: Some(share),
            shared_public_key: Some(shared_public_key),
        } = response
        else {
            return Err("dealer declined".to_string());
        };

        if share.is_zero() || shared_public_key.is_identity() {
            return Err("dealer returned a degenerate key".to_string());
        }
        let share_public_key = share.public_key();

        let mut keys = self.keys.lock();
        keys.secret_share = Some(share);
        keys.share_public_key = Some(share_public_key);
        keys.shared_public_key = Some(shared_public_key);
        Ok(())
    }

    fn broadcast_signature(&self, progress: &Progress) -> Transition {
        let round = progress.next_round_to_produce;

        let payload = match self.rounds.lock().payload_for(round) {
            Ok(payload) => payload,
            Err(e) => {
                trace!("{} cannot sign round {} yet: {}", self.address, round, e);
                return Transition::after(
                    BeaconState::BroadcastSignature,
                    self.settings.poll_interval,
                );
            }
        };

        let signed = {
            let keys = self.keys.lock();
            match (&keys.secret_share, keys.share_public_key) {
                (Some(share), Some(share_public_key)) => {
                    sign(share, &payload).map(|signature| (share_public_key, signature))
                }
                _ => return Transition::now(BeaconState::BuildAeonKeys),
            }
        };
        let (share_public_key, signature) = match signed {
            Ok(signed) => signed,
            Err(e) => {
                warn!("{} failed to sign round {}: {}", self.address, round, e);
                return Transition::after(
                    BeaconState::BroadcastSignature,
                    self.settings.retry_delay,
                );
            }
        };

        let submission = SignatureSubmission {
            round,
            member_id: self.id,
            share_public_key,
            signature,
        };
        let encoded = serialize(&submission);
        self.enqueue(submission);

        match encoded {
            Ok(payload) => {
                for member in self.cabinet().addresses() {
                    if member == self.address {
                        continue;
                    }
                    // Fire and forget: the response is never awaited
                    drop(self.transport.call_specific_address(
                        &member,
                        RpcOp::SubmitSignature.into(),
                        payload.clone(),
                        self.settings.rpc_timeout,
                    ));
                }
            }
            Err(e) => warn!("{} could not encode submission: {}", self.address, e),
        }

        debug!("{} signed round {}", self.address, round);
        Transition::now(BeaconState::CollectSignatures)
    }

    fn collect_signatures(&self, progress: &mut Progress) -> Transition {
        let round = progress.next_round_to_produce;
        let cabinet = self.cabinet();

        let due: Vec<SignatureSubmission> = {
            let mut queue = self.submissions.lock();
            let (due, later): (Vec<_>, Vec<_>) =
                queue.drain(..).partition(|s| s.round <= round);
            *queue = later.into();
            due
        };

        let shared_public_key = self.keys.lock().shared_public_key;
        let Some(shared_public_key) = shared_public_key else {
            return Transition::now(BeaconState::BuildAeonKeys);
        };

        let mut rounds = self.rounds.lock();
        let mut accepted = 0;
        for submission in due {
            if submission.round < round {
                trace!(
                    "{} discarding stale share for round {}",
                    self.address,
                    submission.round
                );
                continue;
            }
            if !cabinet.contains_id(&submission.member_id) {
                debug!(
                    "{} discarding share from non-member {}",
                    self.address, submission.member_id
                );
                continue;
            }

            let added = rounds.round_mut(round).and_then(|r| {
                r.add_share(
                    submission.member_id,
                    &submission.share_public_key,
                    submission.signature,
                )
            });
            match added {
                Ok(_) => accepted += 1,
                Err(e) => debug!("{} discarding share: {}", self.address, e),
            }
        }

        let current = match rounds.round_mut(round) {
            Ok(current) => current,
            Err(e) => {
                warn!("{} cannot collect round {}: {}", self.address, round, e);
                return Transition::after(
                    BeaconState::CollectSignatures,
                    self.settings.poll_interval,
                );
            }
        };

        if current.has_signature() || current.share_count() >= cabinet.threshold() {
            return self.recover(current, cabinet.threshold(), &shared_public_key, progress);
        }

        trace!(
            "{} round {} has {}/{} shares ({} new)",
            self.address,
            round,
            current.share_count(),
            cabinet.threshold(),
            accepted
        );
        Transition::after(BeaconState::CollectSignatures, self.settings.poll_interval)
    }

    fn recover(
        &self,
        current: &mut Round,
        threshold: usize,
        shared_public_key: &PublicKey,
        progress: &mut Progress,
    ) -> Transition {
        let round = current.index();
        match current.try_recover(threshold, shared_public_key) {
            Ok(entropy) => {
                progress.next_round_to_produce = round + 1;
                info!(
                    "{} recovered round {} entropy {}",
                    self.address,
                    round,
                    hex::encode(entropy)
                );
                Transition::now(BeaconState::Complete)
            }
            Err(RoundError::AggregateVerificationFailed(failed)) => {
                critical!(
                    "{} aggregate signature for round {} failed verification",
                    self.address,
                    failed
                );
                let _ = self
                    .alarms
                    .send(BeaconAlarm::AggregateVerificationFailed { round: failed });
                Transition::after(BeaconState::CollectSignatures, self.settings.retry_delay)
            }
            Err(e) => {
                warn!("{} recovery of round {} failed: {}", self.address, round, e);
                Transition::after(BeaconState::CollectSignatures, self.settings.retry_delay)
            }
        }
    }

    fn complete(&self, progress: &Progress) -> Transition {
        let consumed = self.rounds.lock().next_to_consume();
        let ahead = progress.next_round_to_produce.saturating_sub(consumed);
        if ahead < self.settings.read_ahead {
            Transition::now(BeaconState::BroadcastSignature)
        } else {
            Transition::after(BeaconState::Complete, self.settings.poll_interval)
        }
    }

    fn enqueue(&self, submission: SignatureSubmission) {
        if !self.cabinet().contains_id(&submission.member_id) {
            debug!(
                "{} discarding submission from non-member {}",
                self.address, submission.member_id
            );
            return;
        }

        {
            let mut queue = self.submissions.lock();
            if queue.len() >= MAX_QUEUED_SUBMISSIONS {
                warn!("{} submission queue full, dropping", self.address);
                return;
            }
            queue.push_back(submission);
        }
        self.wake.notify_one();
    }
}

impl<T: RpcTransport> BeaconRpc for BeaconService<T> {
    fn register(&self, from: &MemberAddress, request: RegisterRequest) -> RegisterResponse {
        let cabinet = self.cabinet();
        let accepted = *from == request.address
            && cabinet.id_of(&request.address) == Some(request.id);

        if accepted {
            self.registered.lock().insert(request.address);
        } else {
            debug!("{} rejected registration from {}", self.address, from);
        }
        RegisterResponse { accepted }
    }

    fn request_secret(&self, from: &MemberAddress, request: SecretRequest) -> SecretResponse {
        let cabinet = self.cabinet();
        if *from != request.address || !cabinet.is_dealer(&self.address) {
            return SecretResponse::rejected();
        }
        let Some(id) = cabinet.id_of(&request.address) else {
            debug!("{} refused share to non-member {}", self.address, from);
            return SecretResponse::rejected();
        };

        let keys = self.keys.lock();
        match (keys.dealt.get(&id), keys.shared_public_key) {
            (Some(share), Some(shared_public_key)) => SecretResponse {
                success: true,
                secret_share: Some(share.clone()),
                shared_public_key: Some(shared_public_key),
            },
            _ => SecretResponse::rejected(),
        }
    }

    fn submit_signature(&self, from: &MemberAddress, submission: SignatureSubmission) {
        trace!(
            "{} received share for round {} from {}",
            self.address,
            submission.round,
            from
        );
        if self.cabinet().id_of(from) != Some(submission.member_id) {
            warn!(
                "{} dropping share for {} sent by {}",
                self.address, submission.member_id, from
            );
            return;
        }
        self.enqueue(submission);
    }
}

impl<T: RpcTransport> EntropyGenerator for BeaconService<T> {
    fn generate_entropy(
        &self,
        _block_digest: &[u8],
        block_number: u64,
    ) -> Result<Entropy, EntropyError> {
        let entropy = {
            let mut rounds = self.rounds.lock();
            let consumed = rounds.next_to_consume();

            if block_number > consumed {
                return Err(EntropyError::NotReady);
            }

            let entropy = rounds.entropy(block_number).map_err(|e| match e {
                RoundError::Evicted(round) => EntropyError::Evicted(round),
                _ => EntropyError::NotReady,
            })?;

            if block_number < consumed {
                return Ok(entropy);
            }
            rounds.advance_consumption();
            entropy
        };

        debug!("{} consumed round {}", self.address, block_number);
        self.wake.notify_one();
        Ok(entropy)
    }
}
