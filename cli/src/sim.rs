//! In-process round simulation: a chain of 3 (FrontServer, one
//! MiddleServer, SpreadingServer) plus one dead-drop server, wired
//! together with `tokio::sync::mpsc` channels standing in for the
//! socket-based "actor whose inbox is the socket" model (spec Design
//! Notes). Each stage is a long-lived task owning its server instance;
//! a round's batch travels forward through the channels and the
//! matched/wrapped reply travels back the same path via a `oneshot`
//! per job, the way a real hop would correlate a request with its
//! eventual reply.

use std::sync::Arc;
use std::time::Duration;

use mixchain_core::crypto::{PublicKeyBytes, StaticKeypair};
use mixchain_core::onion::ChainLayer;
use mixchain_core::server::deaddrop::DeadDropServer;
use mixchain_core::server::front::FrontServer;
use mixchain_core::server::middle::MiddleServer;
use mixchain_core::server::spreading::SpreadingServer;
use mixchain_core::{ChainConfig, Client};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

/// Dummy reply address type for the front server's client registry — the
/// simulation delivers replies in-process rather than over a socket, so
/// clients are addressed by their position in `Simulation::clients`.
pub type SimAddr = u32;

struct DeadDropJob {
    round: u64,
    layers: Vec<mixchain_core::onion::DeadDropLayer>,
    reply_to: oneshot::Sender<Vec<Vec<u8>>>,
}

struct SpreadingJob {
    round: u64,
    bodies: Vec<Vec<u8>>,
    reply_to: oneshot::Sender<Vec<Vec<u8>>>,
}

struct MiddleJob {
    round: u64,
    bodies: Vec<Vec<u8>>,
    reply_to: oneshot::Sender<Vec<Vec<u8>>>,
}

struct FrontJob {
    round: u64,
    admissions: Vec<(PublicKeyBytes, ChainLayer)>,
    reply_to: oneshot::Sender<Vec<(PublicKeyBytes, Vec<u8>)>>,
}

fn spawn_dead_drop(dead_drop: DeadDropServer) -> mpsc::Sender<DeadDropJob> {
    let (tx, mut rx) = mpsc::channel::<DeadDropJob>(8);
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            dead_drop.start_round(job.round);
            dead_drop.set_expected(job.layers.len());
            for layer in &job.layers {
                if let Err(e) = dead_drop.admit(layer) {
                    debug!(round = job.round, error = %e, "dead drop rejected an entry");
                }
            }
            let replies = dead_drop.match_and_wrap();
            let _ = job.reply_to.send(replies);
        }
    });
    tx
}

fn spawn_spreading(spreading: SpreadingServer, dead_drop_tx: mpsc::Sender<DeadDropJob>) -> mpsc::Sender<SpreadingJob> {
    let (tx, mut rx) = mpsc::channel::<SpreadingJob>(8);
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            spreading.start_round(job.round);
            spreading.set_expected(job.bodies.len());
            for body in &job.bodies {
                if let Err(e) = spreading.admit(body) {
                    debug!(round = job.round, error = %e, "spreading server rejected an entry");
                }
            }
            let routed = spreading.route_to_dead_drops();

            let mut dd_replies = std::collections::HashMap::new();
            for (dead_drop_index, indices_and_layers) in &routed.dest {
                let layers = indices_and_layers.iter().map(|(_, l)| l.clone()).collect();
                let (reply_tx, reply_rx) = oneshot::channel();
                let _ = dead_drop_tx
                    .send(DeadDropJob { round: job.round, layers, reply_to: reply_tx })
                    .await;
                if let Ok(replies) = reply_rx.await {
                    dd_replies.insert(*dead_drop_index, replies);
                }
            }

            let out = spreading.complete_round(&routed, dd_replies);
            let _ = job.reply_to.send(out);
        }
    });
    tx
}

fn spawn_middle(middle: MiddleServer, spreading_tx: mpsc::Sender<SpreadingJob>) -> mpsc::Sender<MiddleJob> {
    let (tx, mut rx) = mpsc::channel::<MiddleJob>(8);
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            middle.start_round(job.round);
            middle.set_expected(job.bodies.len());
            for body in &job.bodies {
                match bincode::deserialize::<ChainLayer>(body) {
                    Ok(layer) => {
                        if let Err(e) = middle.admit(&layer) {
                            debug!(round = job.round, error = %e, "middle hop rejected an entry");
                        }
                    }
                    Err(e) => debug!(round = job.round, error = %e, "middle hop received a malformed layer"),
                }
            }
            let shuffled = middle.close_and_shuffle();

            let (reply_tx, reply_rx) = oneshot::channel();
            let _ = spreading_tx.send(SpreadingJob { round: job.round, bodies: shuffled, reply_to: reply_tx }).await;
            let from_downstream = reply_rx.await.unwrap_or_default();

            let out = middle.complete_round(from_downstream);
            let _ = job.reply_to.send(out);
        }
    });
    tx
}

fn spawn_front(front: FrontServer<SimAddr>, middle_tx: mpsc::Sender<MiddleJob>) -> mpsc::Sender<FrontJob> {
    let (tx, mut rx) = mpsc::channel::<FrontJob>(8);
    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            front.start_round(job.round);
            for (client_key, outer) in &job.admissions {
                if let Err(e) = front.admit(*client_key, outer) {
                    debug!(round = job.round, error = %e, "front server rejected an admission");
                }
            }
            let shuffled = front.close_and_shuffle();

            let (reply_tx, reply_rx) = oneshot::channel();
            let _ = middle_tx.send(MiddleJob { round: job.round, bodies: shuffled, reply_to: reply_tx }).await;
            let from_downstream = reply_rx.await.unwrap_or_default();

            let out = front.complete_round(from_downstream);
            let _ = job.reply_to.send(out);
        }
    });
    tx
}

/// Owns a chain's front-of-pipe sender and the clients dialing through it.
/// Dropping the `Simulation` drops `front_tx`, which cascades shutdown
/// through every downstream stage task.
pub struct Simulation {
    cfg: Arc<ChainConfig>,
    front_tx: mpsc::Sender<FrontJob>,
    pub clients: Vec<Client>,
}

impl Simulation {
    /// Build a chain of 3 (front, one middle hop, spreading) with a single
    /// dead-drop server, and `n_clients` freshly generated clients with no
    /// dialed partner yet.
    pub fn new(n_clients: usize) -> Self {
        let front_secret = StaticKeypair::generate();
        let middle_secret = StaticKeypair::generate();
        let spreading_placeholder_key = StaticKeypair::generate().public();
        let dead_drop_secret = StaticKeypair::generate();

        let cfg = Arc::new(ChainConfig {
            chain_len: 3,
            chain_keys: vec![front_secret.public(), middle_secret.public(), spreading_placeholder_key],
            dead_drop_count: 1,
            dead_drop_keys: vec![dead_drop_secret.public()],
            slot_space: mixchain_core::config::FULL_SLOT_SPACE,
            inner_payload_budget: 1024,
            round_duration: Duration::from_secs(2),
            hop_timeout: Duration::from_millis(500),
            reply_timeout: Duration::from_secs(3),
        });
        cfg.validate().expect("simulation chain config is always valid");

        let dead_drop_tx = spawn_dead_drop(DeadDropServer::new(dead_drop_secret));
        let spreading_tx = spawn_spreading(SpreadingServer::new(), dead_drop_tx);
        let middle_tx = spawn_middle(MiddleServer::new(1, middle_secret), spreading_tx);
        let front_tx = spawn_front(FrontServer::new(cfg.clone(), front_secret), middle_tx);

        let clients = (0..n_clients).map(|_| Client::new(cfg.clone(), 0)).collect();
        Self { cfg, front_tx, clients }
    }

    pub fn chain_config(&self) -> &ChainConfig {
        &self.cfg
    }

    /// Drive every client through `on_round_start`, admit the round at the
    /// front of the chain, and return each client's decrypted reply
    /// (`None` for cover traffic or a failed decrypt).
    pub async fn run_round(&mut self, round: u64) -> Vec<Option<Vec<u8>>> {
        let pending: Vec<_> = self
            .clients
            .iter_mut()
            .map(|c| c.on_round_start(round).expect("construct_onion with a valid chain config cannot fail"))
            .collect();

        let admissions: Vec<_> = self
            .clients
            .iter()
            .zip(&pending)
            .map(|(c, p)| (c.public_key(), c.outer_onion(p)))
            .collect();

        info!(round, n = admissions.len(), "round admitted");

        let (reply_tx, reply_rx) = oneshot::channel();
        let _ = self.front_tx.send(FrontJob { round, admissions, reply_to: reply_tx }).await;
        let replies: std::collections::HashMap<_, _> = reply_rx.await.unwrap_or_default().into_iter().collect();

        self.clients
            .iter()
            .zip(&pending)
            .map(|(c, p)| {
                replies
                    .get(&c.public_key())
                    .and_then(|wrapped| c.decrypt_reply(p, wrapped))
            })
            .collect()
    }
}
