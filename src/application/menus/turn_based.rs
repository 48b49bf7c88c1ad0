use rand::seq::SliceRandom;
use std::time::Duration;

use super::board::{Attribution, OptionsBoard};
use crate::domain::{MenuError, Participant};
use crate::infra::channel::{
    Embed, InteractionChannel, MessageContent, MessageHandle, Symbol,
};

/// Alternating-turn counter. With `double` set, the opening turn is a
/// single pick and every later turn consumes two, which keeps a draft fair
/// when the second picker would otherwise always trail.
struct Turns {
    cur: usize,
    left: u32,
    double: bool,
}

impl Turns {
    fn new(double: bool) -> Self {
        Self {
            cur: 0,
            left: 1,
            double,
        }
    }

    fn selector(&self) -> usize {
        self.cur
    }

    fn advance(&mut self) {
        self.left -= 1;
        if self.left == 0 {
            self.cur = 1 - self.cur;
            self.left = if self.double { 2 } else { 1 };
        }
    }
}

/// One pick-or-timeout decision. The wait resolves exactly once: either
/// the selector's reaction arrives inside the window, or the deadline
/// passes and a uniform-random remaining option is chosen. Input landing
/// after the decision is never observed for this turn.
async fn prompt_choice(
    channel: &dyn InteractionChannel,
    handle: MessageHandle,
    selector: &Participant,
    remaining: &[Symbol],
    timeout: Duration,
) -> Result<(Symbol, Attribution), MenuError> {
    match channel
        .await_reaction(handle, std::slice::from_ref(selector), remaining, timeout)
        .await?
    {
        Some(reaction) => Ok((reaction.symbol, Attribution::Selector(reaction.participant))),
        None => {
            let symbol = {
                let mut rng = rand::thread_rng();
                *remaining.choose(&mut rng).expect("turn prompted with no options")
            };
            Ok((symbol, Attribution::Timeout))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnAction {
    Veto,
    Pick,
}

impl TurnAction {
    fn verb(self) -> &'static str {
        match self {
            Self::Veto => "veto",
            Self::Pick => "pick",
        }
    }

    fn mark(self) -> Symbol {
        match self {
            Self::Veto => Symbol::VETOED,
            Self::Pick => Symbol::TICK,
        }
    }
}

/// Two selectors alternately veto options until `n_picks` survive; the
/// survivors are then picked in turn (a lone leftover is auto-assigned).
///
/// Veto turns are trimmed to an even count so both selectors veto equally
/// often. Picks come back in pick order, so with `n_picks == 1` the last
/// surviving option is the winner.
pub struct TurnBasedVetoMenu<'a> {
    channel: &'a dyn InteractionChannel,
    selectors: [Participant; 2],
    selectors_name: String,
    option_name: String,
    board: OptionsBoard,
    timeout: Duration,
    picks_wanted: usize,
    picks: Vec<String>,
}

impl<'a> TurnBasedVetoMenu<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        channel: &'a dyn InteractionChannel,
        selectors: [Participant; 2],
        title: impl Into<String>,
        option_name: impl Into<String>,
        selectors_name: impl Into<String>,
        options: &[String],
        n_picks: usize,
        timeout: Duration,
    ) -> Result<Self, MenuError> {
        if options.len() < 2 {
            return Err(MenuError::NotEnoughOptions {
                min: 2,
                got: options.len(),
            });
        }
        if n_picks > options.len() - 1 {
            return Err(MenuError::TooManyPicks {
                picks: n_picks,
                options: options.len(),
            });
        }
        let option_name = option_name.into();
        let board = OptionsBoard::new(title, &option_name, options)?;
        Ok(Self {
            channel,
            selectors,
            selectors_name: selectors_name.into(),
            option_name,
            board,
            timeout,
            picks_wanted: n_picks,
            picks: Vec::new(),
        })
    }

    pub async fn run(&mut self) -> Result<Vec<String>, MenuError> {
        let intro = format!(
            "{} and {} are the {}.",
            self.selectors[0].mention(),
            self.selectors[1].mention(),
            self.selectors_name
        );
        self.board.post(self.channel, Some(intro)).await?;

        let mut turns = Turns::new(false);
        let veto_turns = {
            let mut n = self.board.remaining_len() - self.picks_wanted;
            n -= n % 2;
            n
        };
        self.take_turns(&mut turns, veto_turns, TurnAction::Veto)
            .await?;
        self.take_turns(&mut turns, self.picks_wanted, TurnAction::Pick)
            .await?;
        if self.picks.len() < self.picks_wanted && self.board.remaining_len() > 0 {
            let symbol = self.board.remaining()[0];
            self.apply(symbol, Attribution::Auto, TurnAction::Pick)
                .await?;
        }

        let summary = self.picks.join("\n");
        self.board
            .finish(
                self.channel,
                MessageContent::text(format!(
                    "The {} has been completed, these are the remaining {}s:\n{}",
                    self.board.title(),
                    self.option_name,
                    summary
                )),
            )
            .await;
        Ok(self.picks.clone())
    }

    pub fn board(&self) -> &OptionsBoard {
        &self.board
    }

    async fn take_turns(
        &mut self,
        turns: &mut Turns,
        iterations: usize,
        action: TurnAction,
    ) -> Result<(), MenuError> {
        for _ in 0..iterations {
            let selector = self.selectors[turns.selector()].clone();
            if self.board.remaining_len() == 1 {
                let symbol = self.board.remaining()[0];
                self.apply(symbol, Attribution::Selector(selector), action)
                    .await?;
                break;
            }
            self.board.set_footer(format!(
                "{}'s turn to {} {}.",
                selector.name,
                action.verb(),
                self.option_name
            ));
            self.board.sync(self.channel).await;
            let handle = self.board.handle().expect("board posted before turns");
            let (symbol, by) = prompt_choice(
                self.channel,
                handle,
                &selector,
                &self.board.remaining(),
                self.timeout,
            )
            .await?;
            self.apply(symbol, by, action).await?;
            turns.advance();
        }
        Ok(())
    }

    async fn apply(
        &mut self,
        symbol: Symbol,
        by: Attribution,
        action: TurnAction,
    ) -> Result<(), MenuError> {
        let option = self
            .board
            .resolve(symbol, action.mark(), action.verb(), by)?;
        if action == TurnAction::Pick {
            self.picks.push(option);
        }
        self.board.sync(self.channel).await;
        Ok(())
    }
}

/// Two selectors draft every option between them: the first selector opens
/// with a single pick, then turns alternate taking two picks each until
/// the pool is exhausted.
pub struct TurnBasedSelectionMenu<'a> {
    channel: &'a dyn InteractionChannel,
    selectors: [Participant; 2],
    selectors_name: String,
    option_name: String,
    board: OptionsBoard,
    timeout: Duration,
    selections: [Vec<String>; 2],
}

impl<'a> TurnBasedSelectionMenu<'a> {
    pub fn new(
        channel: &'a dyn InteractionChannel,
        selectors: [Participant; 2],
        title: impl Into<String>,
        option_name: impl Into<String>,
        selectors_name: impl Into<String>,
        options: &[String],
        timeout: Duration,
    ) -> Result<Self, MenuError> {
        if options.len() < 2 {
            return Err(MenuError::NotEnoughOptions {
                min: 2,
                got: options.len(),
            });
        }
        if options.len() % 2 != 0 {
            return Err(MenuError::OddOptionCount(options.len()));
        }
        let option_name = option_name.into();
        let board = OptionsBoard::new(title, &option_name, options)?;
        Ok(Self {
            channel,
            selectors,
            selectors_name: selectors_name.into(),
            option_name,
            board,
            timeout,
            selections: [Vec::new(), Vec::new()],
        })
    }

    pub async fn run(&mut self) -> Result<[Vec<String>; 2], MenuError> {
        let intro = format!(
            "{} and {} are the {}.",
            self.selectors[0].mention(),
            self.selectors[1].mention(),
            self.selectors_name
        );
        self.board.post(self.channel, Some(intro)).await?;

        let total = self.board.remaining_len();
        let mut turns = Turns::new(true);
        for _ in 0..total {
            let idx = turns.selector();
            let selector = self.selectors[idx].clone();
            if self.board.remaining_len() == 1 {
                let symbol = self.board.remaining()[0];
                self.select(symbol, idx, Attribution::Auto).await?;
                break;
            }
            self.board.set_footer(format!(
                "{}'s turn to pick {}.",
                selector.name, self.option_name
            ));
            self.board.sync(self.channel).await;
            let handle = self.board.handle().expect("board posted before turns");
            let (symbol, by) = prompt_choice(
                self.channel,
                handle,
                &selector,
                &self.board.remaining(),
                self.timeout,
            )
            .await?;
            self.select(symbol, idx, by).await?;
            turns.advance();
        }

        let embed = Embed::new(self.board.title(), "Complete")
            .field(
                format!("{}'s Picks", self.selectors[0].name),
                self.selections[0].join("\n"),
            )
            .field(
                format!("{}'s Picks", self.selectors[1].name),
                self.selections[1].join("\n"),
            );
        self.board
            .finish(self.channel, MessageContent::embed(embed))
            .await;
        Ok(self.selections.clone())
    }

    pub fn board(&self) -> &OptionsBoard {
        &self.board
    }

    async fn select(
        &mut self,
        symbol: Symbol,
        idx: usize,
        by: Attribution,
    ) -> Result<(), MenuError> {
        let mark = if idx == 0 { Symbol::BLUE } else { Symbol::ORANGE };
        let option = self.board.resolve(symbol, mark, "pick", by)?;
        self.selections[idx].push(option);
        self.board.sync(self.channel).await;
        Ok(())
    }
}
