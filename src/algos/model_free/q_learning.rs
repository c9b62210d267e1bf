//! Tabular Q-learning with visit-count learning-rate decay and
//! optimism-under-uncertainty exploration.

use crate::config::LearnerConfig;
use crate::games::Player;
use crate::mdps::Mdp;
use crate::percepts::Percept;
use crate::states::{StateAbstraction, StateKey};
use itertools::Itertools;
use rand::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use tracing::trace;

/// The exploration function `f(Q̂, N̂)`: trades optimism about under-visited
/// pairs against exploitation of learned values.
pub trait ExplorationPolicy {
    fn value(&self, q: f64, n: u64) -> f64;
}

/// Pairs visited fewer than `min_visits` times always look worth
/// `optimism`, which must be at least as large as any achievable return.
/// Unseen pairs have `n = 0` and therefore fall below any positive
/// threshold; no separate case is needed for them.
#[derive(Debug, Clone)]
pub struct OptimisticExploration {
    pub min_visits: u64,
    pub optimism: f64,
}

impl ExplorationPolicy for OptimisticExploration {
    fn value(&self, q: f64, n: u64) -> f64 {
        if n < self.min_visits {
            self.optimism
        } else {
            q
        }
    }
}

/// Per-state row of the stats dump.
#[derive(Debug, Serialize)]
pub struct StateStats {
    pub state: String,
    pub policy: Option<String>,
    pub utility: f64,
    pub visits: u64,
    pub actions: Vec<ActionStats>,
}

#[derive(Debug, Serialize)]
pub struct ActionStats {
    pub action: String,
    pub q: f64,
    pub n: u64,
}

/// A model-free learner over abstracted states.
///
/// The `q` and `n` tables grow monotonically and persist across episodes;
/// one learner instance accumulates experience for its whole lifetime.
/// Missing entries read as 0. The remembered `(state, action, reward)`
/// triple carries the previous turn into the next update and is cleared
/// whenever a terminal state ends the episode.
pub struct QLearner<A: StateAbstraction> {
    abstraction: A,
    exploration: Box<dyn ExplorationPolicy>,
    q: HashMap<A::State, HashMap<String, f64>>,
    n: HashMap<A::State, HashMap<String, u64>>,
    prev: Option<(A::State, String, f64)>,
    rng: StdRng,
}

impl<A: StateAbstraction> QLearner<A> {
    pub fn new(abstraction: A, exploration: Box<dyn ExplorationPolicy>, seed: u64) -> Self {
        Self {
            abstraction,
            exploration,
            q: HashMap::new(),
            n: HashMap::new(),
            prev: None,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn with_config(abstraction: A, cfg: &LearnerConfig) -> Self {
        let exploration = OptimisticExploration {
            min_visits: cfg.min_visits,
            optimism: cfg.optimism,
        };
        Self::new(abstraction, Box::new(exploration), cfg.seed)
    }

    /// `max_a Q[state, a]`; 0 for states never updated.
    pub fn utility(&self, state: &A::State, actions: &[String]) -> f64 {
        if actions.is_empty() {
            return 0.0;
        }
        actions
            .iter()
            .map(|a| table_get(&self.q, state, a, 0.0))
            .fold(f64::NEG_INFINITY, f64::max)
    }

    /// Greedy action for `state`, ties broken uniformly at random. `None`
    /// for states the learner has never updated.
    pub fn policy(&mut self, state: &A::State, actions: &[String]) -> Option<String> {
        if self.q.get(state).map_or(true, |row| row.is_empty()) {
            return None;
        }
        let q = &self.q;
        reservoir_argmax(&mut self.rng, actions, |a| table_get(q, state, a, 0.0))
    }

    /// Total number of updates applied to `state`, over all actions.
    pub fn visit_count(&self, state: &A::State) -> u64 {
        self.n
            .get(state)
            .map_or(0, |row| row.values().sum())
    }

    /// `U[cell]` for every cell of the model, through the abstraction.
    pub fn utility_map(&self, mdp: &Mdp) -> HashMap<String, f64> {
        let actions = mdp.actions();
        mdp.states()
            .iter()
            .map(|cell| {
                let state = self.abstraction.state_of(&Percept::new(mdp, cell, 0.0));
                (cell.name().to_string(), self.utility(&state, &actions))
            })
            .collect()
    }

    /// `Pi[cell]` for every cell whose abstract state has been learned.
    pub fn policy_map(&mut self, mdp: &Mdp) -> HashMap<String, String> {
        let actions = mdp.actions();
        mdp.states()
            .iter()
            .filter_map(|cell| {
                let state = self.abstraction.state_of(&Percept::new(mdp, cell, 0.0));
                self.policy(&state, &actions)
                    .map(|a| (cell.name().to_string(), a))
            })
            .collect()
    }

    /// `N[cell]` for every cell of the model.
    pub fn visit_map(&self, mdp: &Mdp) -> HashMap<String, u64> {
        mdp.states()
            .iter()
            .map(|cell| {
                let state = self.abstraction.state_of(&Percept::new(mdp, cell, 0.0));
                (cell.name().to_string(), self.visit_count(&state))
            })
            .collect()
    }

    /// Read-only dump of every learned state, sorted by key, for the
    /// display layer.
    pub fn stats(&mut self, actions: &[String]) -> Vec<StateStats> {
        let states: Vec<A::State> = self
            .q
            .keys()
            .cloned()
            .sorted_by_key(|s| s.to_string())
            .collect();

        states
            .into_iter()
            .map(|state| {
                let per_action = actions
                    .iter()
                    .map(|a| ActionStats {
                        action: a.clone(),
                        q: table_get(&self.q, &state, a, 0.0),
                        n: table_get(&self.n, &state, a, 0),
                    })
                    .collect();
                StateStats {
                    policy: self.policy(&state, actions),
                    utility: self.utility(&state, actions),
                    visits: self.visit_count(&state),
                    state: state.to_string(),
                    actions: per_action,
                }
            })
            .collect()
    }

    fn max_exploration_action(&mut self, state: &A::State, actions: &[String]) -> Option<String> {
        let (q, n, exploration) = (&self.q, &self.n, &*self.exploration);
        reservoir_argmax(&mut self.rng, actions, |a| {
            exploration.value(table_get(q, state, a, 0.0), table_get(n, state, a, 0))
        })
    }
}

impl<A: StateAbstraction> Player for QLearner<A> {
    /// One turn of the learning protocol: force terminal values, update the
    /// previous state-action pair with the one-step bootstrap target under
    /// the harmonic learning rate `1/N`, then either clear the episode
    /// memory (terminal, no action returned) or pick the next action by
    /// the exploration function.
    fn play(&mut self, percept: &Percept) -> Option<String> {
        let s_prime = self.abstraction.state_of(percept);
        let r_prime = percept.current().reward();

        if s_prime.is_terminal() {
            // A terminal state's value is its reward alone; nothing follows
            // it to bootstrap from.
            let row = self.q.entry(s_prime.clone()).or_default();
            for action in percept.actions() {
                row.insert(action.clone(), r_prime);
            }
        }

        if let Some((s, a, r)) = self.prev.take() {
            let visits = {
                let count = self
                    .n
                    .entry(s.clone())
                    .or_default()
                    .entry(a.clone())
                    .or_insert(0);
                *count += 1;
                *count
            };
            let alpha = 1.0 / visits as f64;

            let q_sa = table_get(&self.q, &s, &a, 0.0);
            let best_next = self.utility(&s_prime, percept.actions());
            let target = r + percept.gamma() * best_next;
            let updated = q_sa + alpha * (target - q_sa);

            trace!(state = %s, action = %a, alpha, target, updated, "update");
            self.q.entry(s).or_default().insert(a, updated);
        }

        if s_prime.is_terminal() {
            self.prev = None;
            return None;
        }

        let action = self.max_exploration_action(&s_prime, percept.actions())?;
        self.prev = Some((s_prime, action.clone(), r_prime));
        Some(action)
    }
}

fn table_get<S, V>(table: &HashMap<S, HashMap<String, V>>, s: &S, a: &str, default: V) -> V
where
    S: Eq + Hash,
    V: Copy,
{
    table
        .get(s)
        .and_then(|row| row.get(a))
        .copied()
        .unwrap_or(default)
}

/// Argmax with uniform random tie-breaking: a running tie count `k` accepts
/// each new tie with probability `1/k`, so enumeration order carries no
/// bias.
fn reservoir_argmax(
    rng: &mut StdRng,
    actions: &[String],
    mut f: impl FnMut(&str) -> f64,
) -> Option<String> {
    let mut best: Option<&String> = None;
    let mut best_value = f64::NEG_INFINITY;
    let mut ties = 0u64;

    for action in actions {
        let value = f(action);
        if best.is_none() || value > best_value {
            best = Some(action);
            best_value = value;
            ties = 1;
        } else if value == best_value {
            ties += 1;
            if rng.gen::<f64>() < 1.0 / ties as f64 {
                best = Some(action);
            }
        }
    }

    best.cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdps::GridCell;
    use crate::percepts::NEIGHBORHOOD_SIZE;
    use crate::states::LocalAbstraction;
    use float_eq::assert_float_eq;

    const GAMMA: f64 = 0.9;

    fn actions() -> Vec<String> {
        ["N", "E", "S", "W"].map(str::to_string).to_vec()
    }

    fn goal_cell(reward: f64) -> GridCell {
        let text = format!("2 A 0 G {reward} G 1 X 1.0 1 A X G 0.9 A");
        Mdp::parse(&text, 0).unwrap().cell("G").unwrap()
    }

    /// Percept standing on `center` with the given cardinal neighbors.
    fn percept(center: GridCell, neighbors: [Option<GridCell>; 4]) -> Percept {
        let c = NEIGHBORHOOD_SIZE / 2;
        let [north, east, south, west] = neighbors;
        let mut window: [[Option<GridCell>; NEIGHBORHOOD_SIZE]; NEIGHBORHOOD_SIZE] =
            Default::default();
        window[c - 1][c] = north;
        window[c][c + 1] = east;
        window[c + 1][c] = south;
        window[c][c - 1] = west;
        Percept::from_parts(center, window, actions(), GAMMA, 0.0)
    }

    fn normal_percept() -> Percept {
        percept(GridCell::new("1_1", 0.0), [None, None, None, None])
    }

    fn goal_percept(reward: f64) -> Percept {
        percept(goal_cell(reward), [None, None, None, None])
    }

    fn learner(min_visits: u64, optimism: f64) -> QLearner<LocalAbstraction> {
        QLearner::with_config(
            LocalAbstraction,
            &LearnerConfig {
                min_visits,
                optimism,
                seed: 17,
            },
        )
    }

    #[test]
    fn exploration_override_ignores_learned_values() {
        let f = OptimisticExploration {
            min_visits: 5,
            optimism: 100.0,
        };
        assert_float_eq!(f.value(-1000.0, 4), 100.0, abs <= 0.0);
        assert_float_eq!(f.value(1000.0, 4), 100.0, abs <= 0.0);
        assert_float_eq!(f.value(-1000.0, 5), -1000.0, abs <= 0.0);
        assert_float_eq!(f.value(42.0, 1_000_000), 42.0, abs <= 0.0);
        // Unseen pairs are just n = 0.
        assert_float_eq!(f.value(0.0, 0), 100.0, abs <= 0.0);
    }

    #[test]
    fn terminal_forcing_sets_reward_for_every_action() {
        let mut learner = learner(0, 0.0);

        // One normal step first so the terminal percept also exercises the
        // update path.
        let chosen = learner.play(&normal_percept()).unwrap();
        assert!(actions().contains(&chosen));

        let terminal = learner.play(&goal_percept(10.0));
        assert!(terminal.is_none());

        let goal_state = LocalAbstraction.state_of(&goal_percept(10.0));
        for a in actions() {
            assert_float_eq!(
                learner.utility(&goal_state, &[a]),
                10.0,
                abs <= 1e-12
            );
        }

        // The forced value survives a later visit with the same reward,
        // whatever was there before.
        learner.play(&goal_percept(10.0));
        assert_float_eq!(
            learner.utility(&goal_state, &actions()),
            10.0,
            abs <= 1e-12
        );
    }

    #[test]
    fn one_step_bootstrap_toward_terminal_reward() {
        let mut learner = learner(0, 0.0);

        let start_state = LocalAbstraction.state_of(&normal_percept());
        learner.play(&normal_percept());
        learner.play(&goal_percept(10.0));

        // First update: alpha = 1, target = r(start) + gamma * 10.
        assert_float_eq!(
            learner.utility(&start_state, &actions()),
            GAMMA * 10.0,
            abs <= 1e-12
        );
        assert_eq!(learner.visit_count(&start_state), 1);

        // The terminal cleared the episode memory: a fresh turn updates
        // nothing.
        learner.play(&normal_percept());
        assert_float_eq!(
            learner.utility(&start_state, &actions()),
            GAMMA * 10.0,
            abs <= 1e-12
        );
        assert_eq!(learner.visit_count(&start_state), 1);
    }

    #[test]
    fn learning_rate_decays_harmonically() {
        // Single legal action so the chosen pair is fixed; alternating
        // terminal rewards keep the target away from the current estimate.
        let one_action = vec!["E".to_string()];
        let mut learner = learner(0, 0.0);
        let start_state = LocalAbstraction.state_of(&normal_percept());

        let with_actions = |center: GridCell, acts: &[String]| {
            Percept::from_parts(center, Default::default(), acts.to_vec(), GAMMA, 0.0)
        };

        for k in 1u64..=10 {
            let goal_reward = if k % 2 == 0 { 20.0 } else { 10.0 };
            let q_before = learner.utility(&start_state, &one_action);

            learner.play(&with_actions(GridCell::new("1_1", 0.0), &one_action));
            learner.play(&with_actions(goal_cell(goal_reward), &one_action));

            let q_after = learner.utility(&start_state, &one_action);
            let target = GAMMA * goal_reward;
            let alpha = (q_after - q_before) / (target - q_before);
            assert_float_eq!(alpha, 1.0 / k as f64, abs <= 1e-9);
            assert_eq!(learner.visit_count(&start_state), k);
        }
    }

    #[test]
    fn tie_breaking_is_uniform() {
        // All pairs stay under the visit threshold, so every action keeps
        // the same exploration value and selection is pure tie-breaking.
        let mut learner = learner(u64::MAX, 1.0);
        let mut counts: HashMap<String, u32> = HashMap::new();

        let trials = 8_000;
        for _ in 0..trials {
            let a = learner.play(&normal_percept()).unwrap();
            *counts.entry(a).or_default() += 1;
        }

        assert_eq!(counts.len(), 4);
        for (_, count) in counts {
            assert_float_eq!(count as f64 / trials as f64, 0.25, abs <= 0.02);
        }
    }

    #[test]
    fn unseen_states_have_no_policy_and_zero_utility() {
        let mut learner = learner(0, 0.0);
        let state = LocalAbstraction.state_of(&normal_percept());
        assert_eq!(learner.policy(&state, &actions()), None);
        assert_float_eq!(learner.utility(&state, &actions()), 0.0, abs <= 0.0);
        assert_eq!(learner.visit_count(&state), 0);
    }

    #[test]
    fn queries_do_not_mutate_the_tables() {
        let mut learner = learner(0, 0.0);
        learner.play(&normal_percept());
        learner.play(&goal_percept(10.0));

        let state = LocalAbstraction.state_of(&normal_percept());
        let utility = learner.utility(&state, &actions());
        let visits = learner.visit_count(&state);
        for _ in 0..100 {
            let _ = learner.policy(&state, &actions());
            let _ = learner.utility(&state, &actions());
            let _ = learner.visit_count(&state);
        }
        assert_float_eq!(learner.utility(&state, &actions()), utility, abs <= 0.0);
        assert_eq!(learner.visit_count(&state), visits);
    }

    #[test]
    fn greedy_policy_prefers_the_learned_best_action() {
        // Make E clearly the best action out of the start state by walking
        // E into the goal many times with exploration disabled.
        let mut learner = learner(0, 0.0);
        for _ in 0..20 {
            learner.play(&normal_percept());
            learner.play(&goal_percept(10.0));
        }
        let state = LocalAbstraction.state_of(&normal_percept());
        let best = learner.policy(&state, &actions()).unwrap();

        // Whatever action accumulated value, policy must report one with
        // the maximal Q.
        let best_q = learner.utility(&state, &actions());
        let q_of_best = {
            let single = vec![best];
            learner.utility(&state, &single)
        };
        assert_float_eq!(q_of_best, best_q, abs <= 0.0);
    }

    #[test]
    fn stats_cover_every_learned_state() {
        let mut learner = learner(0, 0.0);
        learner.play(&normal_percept());
        learner.play(&goal_percept(10.0));

        let stats = learner.stats(&actions());
        assert_eq!(stats.len(), 2);
        for row in &stats {
            assert_eq!(row.actions.len(), 4);
        }

        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("\"utility\""));
    }
}
