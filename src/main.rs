use gridrl::algos::model_free::q_learning::QLearner;
use gridrl::config::{LearnerConfig, WorldConfig};
use gridrl::games::Game;
use gridrl::mdps::{grid_world, Mdp};
use gridrl::states::LocalAbstraction;
use gridrl::Result;
use tracing::info;

const TRIALS: u64 = 100_000;

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let world_cfg = WorldConfig::default();
    let learner_cfg = LearnerConfig::default();

    let text = grid_world::random_world(&world_cfg, 1)?;
    let mut mdp = Mdp::parse(&text, learner_cfg.seed)?;
    let mut player = QLearner::with_config(LocalAbstraction, &learner_cfg);

    info!(
        rows = world_cfg.rows,
        cols = world_cfg.cols,
        trials = TRIALS,
        "training"
    );
    println!("{}", grid_world::render(&mdp, &Default::default()));

    let mut avg = 0.0;
    for i in 1..=TRIALS {
        mdp.reset();
        let score = Game::new(&mut mdp, &mut player).play()?;
        avg += (score - avg) / i as f64;
        if i % 5_000 == 0 {
            info!(trial = i, avg, "progress");
        }
    }
    println!("average discounted score over {TRIALS} episodes: {avg:.4}");

    let stats = player.stats(&mdp.actions());
    println!("{}", serde_json::to_string_pretty(&stats)?);

    println!("policy:");
    println!("{}", grid_world::render(&mdp, &player.policy_map(&mdp)));

    println!("utility:");
    let utilities = player
        .utility_map(&mdp)
        .into_iter()
        .map(|(name, u)| (name, format!("{u:.1}")))
        .collect();
    println!("{}", grid_world::render(&mdp, &utilities));

    println!("visits:");
    let visits = player
        .visit_map(&mdp)
        .into_iter()
        .map(|(name, n)| (name, n.to_string()))
        .collect();
    println!("{}", grid_world::render(&mdp, &visits));

    Ok(())
}
