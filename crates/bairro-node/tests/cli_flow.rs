//! Drives the command layer against a state file in a temp directory.

use bairro_governance::ProposalState;
use bairro_node::commands::{execute, Cli};
use bairro_node::config::NodeConfig;
use bairro_node::store::ChainStore;
use bairro_types::{Address, UNIT};
use clap::Parser;
use tempfile::TempDir;

fn setup() -> (TempDir, NodeConfig) {
    let dir = TempDir::new().unwrap();
    let mut config = NodeConfig::default();
    config.state_file = dir.path().join("state.json");
    config.deployment.governor.voting_period = 5;
    (dir, config)
}

fn run(config: &NodeConfig, args: &[&str]) -> anyhow::Result<()> {
    let argv = std::iter::once("bairro").chain(args.iter().copied());
    execute(Cli::parse_from(argv).command, config)
}

fn store(config: &NodeConfig) -> ChainStore {
    ChainStore::new(&config.state_file)
}

#[test]
fn test_init_refuses_to_overwrite() {
    let (_dir, config) = setup();
    run(&config, &["init"]).unwrap();
    assert!(run(&config, &["init"]).is_err());

    run(&config, &["mine", "3"]).unwrap();
    run(&config, &["init", "--force"]).unwrap();
    assert_eq!(store(&config).load().unwrap().block(), 0);
}

#[test]
fn test_commands_need_state() {
    let (_dir, config) = setup();
    assert!(run(&config, &["status"]).is_err());
}

#[test]
fn test_initial_payment_through_cli() {
    let (_dir, config) = setup();
    run(&config, &["init"]).unwrap();
    run(&config, &["mine"]).unwrap();
    run(
        &config,
        &["propose", "--from", "alice", "initial-payment", "--amount", "30", "-d", "Pay the builder"],
    )
    .unwrap();

    let id = {
        let chain = store(&config).load().unwrap();
        let proposal = chain.governor().proposals().next().unwrap();
        proposal.id.to_string()
    };

    run(&config, &["mine", "2"]).unwrap();
    run(&config, &["vote", "--from", "alice", id.as_str(), "for"]).unwrap();
    run(&config, &["vote", "--from", "bob", id.as_str(), "against", "--reason", "too soon"]).unwrap();
    run(&config, &["mine", "6"]).unwrap();
    run(&config, &["queue", "--from", "carol", id.as_str()]).unwrap();
    run(&config, &["execute", "--from", "carol", id.as_str()]).unwrap();

    let chain = store(&config).load().unwrap();
    assert_eq!(chain.bank().balance_of(&Address::from_label("provider")), 30 * UNIT);
    assert!(chain.treasury().is_initial_payment_released());

    let id = chain.governor().proposals().next().unwrap().id;
    assert_eq!(chain.state(id).unwrap(), ProposalState::Executed);

    run(&config, &["events", "--name", "funds_released"]).unwrap();
    let id = id.to_string();
    run(&config, &["state", id.as_str(), "--at", "3"]).unwrap();
}

#[test]
fn test_failed_command_is_not_persisted() {
    let (_dir, config) = setup();
    run(&config, &["init"]).unwrap();
    run(&config, &["mine"]).unwrap();
    run(&config, &["propose", "--from", "alice", "initial-payment", "--amount", "1", "-d", "x"]).unwrap();
    let id = store(&config)
        .load()
        .unwrap()
        .governor()
        .proposals()
        .next()
        .unwrap()
        .id
        .to_string();
    run(&config, &["mine", "2"]).unwrap();
    run(&config, &["vote", "--from", "alice", id.as_str(), "for"]).unwrap();

    let before = std::fs::read_to_string(&config.state_file).unwrap();
    assert!(run(&config, &["vote", "--from", "alice", id.as_str(), "abstain"]).is_err());
    assert!(run(&config, &["confirm", "--from", "alice"]).is_err());
    assert!(run(&config, &["transfer", "--from", "dave", "alice", "1"]).is_err());
    let after = std::fs::read_to_string(&config.state_file).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_confirm_and_balance() {
    let (_dir, config) = setup();
    run(&config, &["init"]).unwrap();
    run(&config, &["confirm", "--from", "provider"]).unwrap();
    run(&config, &["balance", "alice"]).unwrap();

    let chain = store(&config).load().unwrap();
    assert!(chain.treasury().is_service_confirmed());
    assert_eq!(chain.token().balance_of(&Address::from_label("alice")), 50 * UNIT);
}
