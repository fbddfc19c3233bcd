//! Command-line interface.
//!
//! Each invocation loads the chain, applies one command at the current
//! block and saves the result. Accounts are given as `0x` addresses or
//! as labels (`alice`), which map to deterministic addresses.

use std::path::PathBuf;
use std::str::FromStr;

use bairro_governance::call::description_hash;
use bairro_governance::{CallBundle, Chain, Event, ProposalId, TreasuryCall};
use bairro_types::{format_units, parse_units, Address, Amount, BlockNumber, Hash};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing::info;

use crate::config::NodeConfig;
use crate::store::ChainStore;

#[derive(Parser, Debug)]
#[command(name = "bairro")]
#[command(about = "Bairro - community governance over a milestone escrow")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Config file path
    #[arg(short, long, global = true, value_name = "FILE", env = "BAIRRO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Chain state file (overrides the config)
    #[arg(long, global = true, value_name = "FILE")]
    pub state: Option<PathBuf>,

    /// Log filter, e.g. "info" or "bairro_governance=debug"
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Deploy a fresh chain from the configured deployment
    Init {
        /// Overwrite an existing state file
        #[arg(long)]
        force: bool,
    },
    /// Show block height, components and escrow status
    Status,
    /// Advance the chain
    Mine {
        #[arg(default_value = "1")]
        blocks: BlockNumber,
    },
    /// Mint vote tokens (ledger owner only)
    Mint {
        #[arg(long)]
        from: String,
        to: String,
        amount: String,
    },
    /// Transfer vote tokens
    Transfer {
        #[arg(long)]
        from: String,
        to: String,
        amount: String,
    },
    /// Delegate voting weight
    Delegate {
        #[arg(long)]
        from: String,
        to: String,
    },
    /// Token balance and current voting weight
    Balance { account: String },
    /// Voting weight at a past block
    Votes {
        account: String,
        /// Defaults to the previous block
        #[arg(long)]
        at: Option<BlockNumber>,
    },
    /// Submit a treasury proposal
    Propose {
        #[arg(long)]
        from: String,
        #[arg(value_enum)]
        action: ProposalAction,
        /// Payment amount in tokens (payments only)
        #[arg(long)]
        amount: Option<String>,
        /// New controller (ownership transfers only)
        #[arg(long)]
        controller: Option<String>,
        #[arg(short, long)]
        description: String,
    },
    /// Cast a vote: for, against, abstain (or 1, 0, 2)
    Vote {
        #[arg(long)]
        from: String,
        id: String,
        support: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Proposal state, now or at a past block
    State {
        id: String,
        #[arg(long)]
        at: Option<BlockNumber>,
    },
    /// List proposals
    Proposals,
    /// Queue a succeeded proposal
    Queue {
        #[arg(long)]
        from: String,
        id: String,
    },
    /// Execute a queued proposal
    Execute {
        #[arg(long)]
        from: String,
        id: String,
    },
    /// Cancel a pending proposal (proposer only)
    Cancel {
        #[arg(long)]
        from: String,
        id: String,
    },
    /// Attest service completion (service provider only)
    Confirm {
        #[arg(long)]
        from: String,
    },
    /// Print the event log
    Events {
        /// Only events at or after this block
        #[arg(long)]
        since: Option<BlockNumber>,
        /// Only events with this name, e.g. vote_cast
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProposalAction {
    InitialPayment,
    FinalPayment,
    TransferOwnership,
}

/// `0x…` address or a label.
pub fn parse_account(s: &str) -> anyhow::Result<Address> {
    if s.starts_with("0x") {
        Ok(Address::from_str(s)?)
    } else if s.is_empty() {
        anyhow::bail!("Empty account")
    } else {
        Ok(Address::from_label(s))
    }
}

pub fn parse_amount(s: &str) -> anyhow::Result<Amount> {
    Ok(parse_units(s)?)
}

/// `for`/`against`/`abstain`, or the raw support number.
pub fn parse_support(s: &str) -> anyhow::Result<u8> {
    match s.to_ascii_lowercase().as_str() {
        "against" => Ok(0),
        "for" => Ok(1),
        "abstain" => Ok(2),
        other => other
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid support '{}'", s)),
    }
}

fn parse_id(s: &str) -> anyhow::Result<ProposalId> {
    Ok(Hash::from_str(s)?)
}

/// Bundle for a treasury proposal.
pub fn build_bundle(
    chain: &Chain,
    action: ProposalAction,
    amount: Option<&str>,
    controller: Option<&str>,
) -> anyhow::Result<CallBundle> {
    let require_amount = || -> anyhow::Result<Amount> {
        let amount = amount.ok_or_else(|| anyhow::anyhow!("--amount is required for payments"))?;
        parse_amount(amount)
    };

    let call = match action {
        ProposalAction::InitialPayment => TreasuryCall::ReleaseInitialPayment {
            amount: require_amount()?,
        },
        ProposalAction::FinalPayment => TreasuryCall::ReleaseFinalPayment {
            amount: require_amount()?,
        },
        ProposalAction::TransferOwnership => {
            let controller = controller
                .ok_or_else(|| anyhow::anyhow!("--controller is required for ownership transfers"))?;
            TreasuryCall::TransferOwnership {
                new_controller: parse_account(controller)?,
            }
        }
    };
    Ok(CallBundle::single(chain.treasury().address(), call.encode()))
}

/// Stored bundle and description hash for `id`.
fn stored_proposal(chain: &Chain, id: &ProposalId) -> anyhow::Result<(CallBundle, Hash)> {
    let proposal = chain
        .governor()
        .proposal(id)
        .ok_or_else(|| anyhow::anyhow!("Unknown proposal {}", id))?;
    Ok((proposal.bundle.clone(), description_hash(&proposal.description)))
}

/// Run one command against the configured state file.
pub fn execute(command: Commands, config: &NodeConfig) -> anyhow::Result<()> {
    let store = ChainStore::new(&config.state_file);

    if let Commands::Init { force } = command {
        if store.exists() && !force {
            anyhow::bail!(
                "State file '{}' already exists (use --force to overwrite)",
                store.path().display()
            );
        }
        let chain = Chain::deploy(&config.deployment)?;
        store.save(&chain)?;
        info!(name = %config.name, path = %store.path().display(), "chain initialized");
        print_status(&chain);
        return Ok(());
    }

    let mut chain = store.load()?;
    if apply(command, &mut chain)? {
        store.save(&chain)?;
    }
    Ok(())
}

/// Apply a command. Returns whether the chain changed.
pub fn apply(command: Commands, chain: &mut Chain) -> anyhow::Result<bool> {
    match command {
        Commands::Init { .. } => anyhow::bail!("init is handled before loading state"),

        Commands::Status => {
            print_status(chain);
            Ok(false)
        }

        Commands::Mine { blocks } => {
            let block = chain.mine(blocks);
            println!("Block: {}", block.to_string().bright_green());
            Ok(true)
        }

        Commands::Mint { from, to, amount } => {
            let to = parse_account(&to)?;
            chain.mint(parse_account(&from)?, to, parse_amount(&amount)?)?;
            success(&format!("Minted {} to {}", amount, to));
            Ok(true)
        }

        Commands::Transfer { from, to, amount } => {
            let to = parse_account(&to)?;
            chain.transfer(parse_account(&from)?, to, parse_amount(&amount)?)?;
            success(&format!("Transferred {} to {}", amount, to));
            Ok(true)
        }

        Commands::Delegate { from, to } => {
            let to = parse_account(&to)?;
            chain.delegate(parse_account(&from)?, to)?;
            success(&format!("Delegated to {}", to));
            Ok(true)
        }

        Commands::Balance { account } => {
            let account = parse_account(&account)?;
            let token = chain.token();
            println!("Address:  {}", account.to_string().bright_cyan());
            println!("Balance:  {} {}", format_units(token.balance_of(&account)), token.symbol());
            println!("Votes:    {}", format_units(token.current_votes(&account)));
            match token.delegates(&account) {
                Some(delegate) => println!("Delegate: {}", delegate),
                None => println!("Delegate: {}", "none".yellow()),
            }
            println!("Funds:    {}", format_units(chain.bank().balance_of(&account)));
            Ok(false)
        }

        Commands::Votes { account, at } => {
            let account = parse_account(&account)?;
            let at = match at {
                Some(at) => at,
                None => chain
                    .block()
                    .checked_sub(1)
                    .ok_or_else(|| anyhow::anyhow!("No past block yet; mine one first"))?,
            };
            let votes = chain.get_votes(&account, at)?;
            println!("Votes at block {}: {}", at, format_units(votes).bright_green());
            Ok(false)
        }

        Commands::Propose {
            from,
            action,
            amount,
            controller,
            description,
        } => {
            let bundle = build_bundle(chain, action, amount.as_deref(), controller.as_deref())?;
            let id = chain.propose(parse_account(&from)?, bundle, &description)?;
            let governor = chain.governor();
            success("Proposal created");
            println!("Id:       {}", id.to_string().bright_cyan());
            println!("Snapshot: {}", governor.proposal_snapshot(&id)?);
            println!("Deadline: {}", governor.proposal_deadline(&id)?);
            Ok(true)
        }

        Commands::Vote {
            from,
            id,
            support,
            reason,
        } => {
            let voter = parse_account(&from)?;
            let id = parse_id(&id)?;
            let support = parse_support(&support)?;
            let weight = match reason {
                Some(reason) => chain.cast_vote_with_reason(voter, id, support, &reason)?,
                None => chain.cast_vote(voter, id, support)?,
            };
            success(&format!("Vote counted with weight {}", format_units(weight)));
            Ok(true)
        }

        Commands::State { id, at } => {
            let id = parse_id(&id)?;
            let state = match at {
                Some(at) => chain.state_at(id, at)?,
                None => chain.state(id)?,
            };
            println!("{}", state.to_string().bright_green());
            Ok(false)
        }

        Commands::Proposals => {
            let proposals: Vec<_> = chain.governor().proposals().collect();
            if proposals.is_empty() {
                println!("{}", "No proposals".yellow());
                return Ok(false);
            }
            for proposal in proposals {
                let state = chain.state(proposal.id)?;
                println!("{} {}", proposal.id.to_string().bright_cyan(), state);
                println!("  {}", proposal.description);
                println!(
                    "  for {} / against {} / abstain {}",
                    format_units(proposal.tally.for_votes),
                    format_units(proposal.tally.against_votes),
                    format_units(proposal.tally.abstain_votes)
                );
            }
            Ok(false)
        }

        Commands::Queue { from, id } => {
            let id = parse_id(&id)?;
            let (bundle, dh) = stored_proposal(chain, &id)?;
            chain.queue(parse_account(&from)?, &bundle, &dh)?;
            let eta = chain.governor().proposal_eta(&id)?.unwrap_or_default();
            success(&format!("Queued; executable from block {}", eta));
            Ok(true)
        }

        Commands::Execute { from, id } => {
            let id = parse_id(&id)?;
            let (bundle, dh) = stored_proposal(chain, &id)?;
            chain.execute(parse_account(&from)?, &bundle, &dh)?;
            success("Proposal executed");
            Ok(true)
        }

        Commands::Cancel { from, id } => {
            chain.cancel(parse_account(&from)?, parse_id(&id)?)?;
            success("Proposal canceled");
            Ok(true)
        }

        Commands::Confirm { from } => {
            chain.confirm_completion(parse_account(&from)?)?;
            success("Service completion confirmed");
            Ok(true)
        }

        Commands::Events { since, name } => {
            let records = chain
                .events()
                .since(since.unwrap_or(0))
                .filter(|r| name.as_deref().map_or(true, |n| r.event.name() == n));
            for record in records {
                println!(
                    "#{:<6} {:<24} {}",
                    record.block,
                    record.event.name().bright_cyan(),
                    describe(&record.event)
                );
            }
            Ok(false)
        }
    }
}

fn describe(event: &Event) -> String {
    serde_json::to_string(event).unwrap_or_else(|_| event.name().to_string())
}

fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

fn print_status(chain: &Chain) {
    let treasury = chain.treasury();
    let flag = |set: bool| if set { "yes".green() } else { "no".yellow() };

    println!("{}", "Bairro".bold());
    println!("{}", "=".repeat(60));
    println!("Block:             {}", chain.block());
    println!("Vote token:        {}", chain.token().address());
    println!("Treasury:          {}", treasury.address());
    println!("Governor:          {}", chain.governor().address());
    println!("Controller:        {}", treasury.controller());
    println!("Service provider:  {}", treasury.service_provider());
    println!("Escrow:            {}", format_units(chain.treasury_balance()));
    println!("Token supply:      {}", format_units(chain.token().total_supply()));
    println!("Initial released:  {}", flag(treasury.is_initial_payment_released()));
    println!("Service confirmed: {}", flag(treasury.is_service_confirmed()));
    println!("Final released:    {}", flag(treasury.is_final_payment_released()));
}
