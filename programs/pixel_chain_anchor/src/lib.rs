use anchor_lang::prelude::*;
use anchor_spl::{
    associated_token::AssociatedToken,
    token::{self, Mint, MintTo, Token, TokenAccount},
};

declare_id!("FgBCXGMCMYimooD9cdHuasz6kczQP9jEXpfJYnH3GMfN");

pub const PLAYER_SEED: &[u8] = b"player";
pub const CHALLENGE_SEED: &[u8] = b"challenge";
pub const CONFIG_SEED: &[u8] = b"config";
pub const REWARD_MINT_SEED: &[u8] = b"reward_mint";
pub const REWARD_AUTHORITY_SEED: &[u8] = b"reward_authority";

// one bit per challenge id, u8 ids -> 256 bits
pub const BITMAP_BYTES: usize = 32;
pub const MAX_URI_LEN: usize = 200;
pub const XP_PER_CHALLENGE: u32 = 10;
// reward mints have 0 decimals, one token per completion
pub const REWARD_AMOUNT: u64 = 1;

#[program]
pub mod pixel_chain_anchor {
    use super::*;

    /// Creates the caller's player profile PDA (`["player", authority]`).
    /// - On first call: stores the authority, sets xp to 0 and clears the completion bitmap.
    /// - On subsequent calls: the account already exists and is left untouched, so progress is never reset.
    pub fn init_player(ctx: Context<InitPlayer>) -> Result<()> {
        let player_key = ctx.accounts.player.key();
        let player = &mut ctx.accounts.player;

        if player.is_initialized() {
            msg!("init_player: profile {} already exists xp={}", player_key, player.xp);
            return Ok(());
        }

        player.init(ctx.accounts.authority.key(), ctx.bumps.player);
        msg!("init_player: created profile {} for {}", player_key, player.authority);

        emit!(PlayerInitialized {
            player: player_key,
            authority: player.authority,
        });
        Ok(())
    }

    /// Creates the singleton game config. Only the program's upgrade authority may call it;
    /// the signer becomes the admin allowed to publish challenges.
    pub fn initialize_config(ctx: Context<InitializeConfig>) -> Result<()> {
        let config = &mut ctx.accounts.config;
        config.admin = ctx.accounts.admin.key();
        config.challenge_count = 0;
        config.bump = ctx.bumps.config;

        msg!("initialize_config: admin={}", config.admin);
        Ok(())
    }

    /// Publishes challenge `challenge_id` with a metadata uri. Admin only.
    pub fn admin_add_challenge(
        ctx: Context<AdminAddChallenge>,
        challenge_id: u8,
        uri: String,
    ) -> Result<()> {
        Challenge::validate_uri(&uri)?;

        let config = &mut ctx.accounts.config;
        config.challenge_count = config
            .challenge_count
            .checked_add(1)
            .ok_or(PixelChainError::ChallengeCountOverflow)?;

        let challenge = &mut ctx.accounts.challenge;
        challenge.id = challenge_id;
        challenge.uri = uri;
        challenge.bump = ctx.bumps.challenge;

        msg!(
            "admin_add_challenge: id={} uri={} total={}",
            challenge_id,
            challenge.uri,
            config.challenge_count
        );

        emit!(ChallengeAdded {
            challenge_id,
            uri: challenge.uri.clone(),
        });
        Ok(())
    }

    /// Marks `challenge_id` as completed for the signer, awards XP and mints the reward token.
    /// The reward mint is a PDA per (authority, challenge) so each completion yields a unique token.
    pub fn complete_challenge(ctx: Context<CompleteChallenge>, challenge_id: u8) -> Result<()> {
        let xp = ctx.accounts.player.record_completion(challenge_id)?;
        msg!(
            "complete_challenge: authority={} id={} xp={}",
            ctx.accounts.authority.key(),
            challenge_id,
            xp
        );

        let seeds = &[REWARD_AUTHORITY_SEED, &[ctx.bumps.reward_authority]];
        let signer = &[&seeds[..]];

        let cpi_accounts = MintTo {
            mint: ctx.accounts.reward_mint.to_account_info(),
            to: ctx.accounts.reward_ata.to_account_info(),
            authority: ctx.accounts.reward_authority.to_account_info(),
        };
        let cpi_ctx = CpiContext::new_with_signer(
            ctx.accounts.token_program.to_account_info(),
            cpi_accounts,
            signer,
        );
        token::mint_to(cpi_ctx, REWARD_AMOUNT)?;

        msg!(
            "complete_challenge: minted reward {} -> {}",
            ctx.accounts.reward_mint.key(),
            ctx.accounts.reward_ata.key()
        );

        emit!(ChallengeCompleted {
            authority: ctx.accounts.authority.key(),
            challenge_id,
            xp,
            reward_mint: ctx.accounts.reward_mint.key(),
        });
        Ok(())
    }
}

/* ---------------------- ACCOUNTS ---------------------- */

#[derive(Accounts)]
pub struct InitPlayer<'info> {
    #[account(
        init_if_needed,
        payer = authority,
        space = 8 + Player::LEN,
        seeds = [PLAYER_SEED, authority.key().as_ref()],
        bump
    )]
    pub player: Account<'info, Player>,

    #[account(mut)]
    pub authority: Signer<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct InitializeConfig<'info> {
    #[account(
        init,
        payer = admin,
        space = 8 + GameConfig::LEN,
        seeds = [CONFIG_SEED],
        bump
    )]
    pub config: Account<'info, GameConfig>,

    #[account(mut)]
    pub admin: Signer<'info>,

    #[account(constraint = program.programdata_address()? == Some(program_data.key()))]
    pub program: Program<'info, crate::program::PixelChainAnchor>,

    #[account(
        constraint = program_data.upgrade_authority_address == Some(admin.key())
            @ PixelChainError::Unauthorized
    )]
    pub program_data: Account<'info, ProgramData>,

    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
#[instruction(challenge_id: u8)]
pub struct AdminAddChallenge<'info> {
    #[account(
        mut,
        seeds = [CONFIG_SEED],
        bump = config.bump,
        has_one = admin @ PixelChainError::Unauthorized
    )]
    pub config: Account<'info, GameConfig>,

    #[account(
        init,
        payer = admin,
        space = 8 + Challenge::LEN,
        seeds = [CHALLENGE_SEED, &[challenge_id]],
        bump
    )]
    pub challenge: Account<'info, Challenge>,

    #[account(mut)]
    pub admin: Signer<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
#[instruction(challenge_id: u8)]
pub struct CompleteChallenge<'info> {
    #[account(
        mut,
        seeds = [PLAYER_SEED, authority.key().as_ref()],
        bump = player.bump,
        has_one = authority @ PixelChainError::Unauthorized
    )]
    pub player: Account<'info, Player>,

    #[account(
        seeds = [CHALLENGE_SEED, &[challenge_id]],
        bump = challenge.bump
    )]
    pub challenge: Account<'info, Challenge>,

    /// PDA that is mint and freeze authority of every reward mint
    /// CHECK: PDA verified by seeds
    #[account(
        seeds = [REWARD_AUTHORITY_SEED],
        bump
    )]
    pub reward_authority: UncheckedAccount<'info>,

    /// Reward mint for this (authority, challenge) pair, created here
    #[account(
        init,
        payer = authority,
        seeds = [REWARD_MINT_SEED, authority.key().as_ref(), &[challenge_id]],
        bump,
        mint::decimals = 0,
        mint::authority = reward_authority,
        mint::freeze_authority = reward_authority
    )]
    pub reward_mint: Account<'info, Mint>,

    /// Authority's ATA for the reward mint
    #[account(
        init,
        payer = authority,
        associated_token::mint = reward_mint,
        associated_token::authority = authority
    )]
    pub reward_ata: Account<'info, TokenAccount>,

    #[account(mut)]
    pub authority: Signer<'info>,

    pub token_program: Program<'info, Token>,
    pub associated_token_program: Program<'info, AssociatedToken>,
    pub system_program: Program<'info, System>,
}

/* ---------------------- STATE ---------------------- */

#[account]
#[derive(Default)]
pub struct Player {
    pub authority: Pubkey,
    pub xp: u32,
    pub completed_bitmap: [u8; BITMAP_BYTES],
    pub bump: u8,
}

impl Player {
    pub const LEN: usize =
        32 + // authority
        4  + // xp
        BITMAP_BYTES + // completed_bitmap
        1;   // bump

    /// A freshly allocated account is all zeroes, so a default authority means not yet set up.
    pub fn is_initialized(&self) -> bool {
        self.authority != Pubkey::default()
    }

    pub fn init(&mut self, authority: Pubkey, bump: u8) {
        self.authority = authority;
        self.xp = 0;
        self.completed_bitmap = [0u8; BITMAP_BYTES];
        self.bump = bump;
    }

    pub fn has_completed(&self, challenge_id: u8) -> bool {
        let (byte_i, mask) = bit_position(challenge_id);
        self.completed_bitmap[byte_i] & mask != 0
    }

    /// Sets the completion bit and awards XP. Returns the new xp total.
    /// Leaves the account unchanged on error.
    pub fn record_completion(
        &mut self,
        challenge_id: u8,
    ) -> std::result::Result<u32, PixelChainError> {
        if self.has_completed(challenge_id) {
            return Err(PixelChainError::AlreadyCompleted);
        }
        let xp = self
            .xp
            .checked_add(XP_PER_CHALLENGE)
            .ok_or(PixelChainError::XpOverflow)?;

        let (byte_i, mask) = bit_position(challenge_id);
        self.completed_bitmap[byte_i] |= mask;
        self.xp = xp;
        Ok(xp)
    }

    pub fn completed_count(&self) -> u32 {
        self.completed_bitmap.iter().map(|b| b.count_ones()).sum()
    }
}

fn bit_position(challenge_id: u8) -> (usize, u8) {
    ((challenge_id / 8) as usize, 1 << (challenge_id % 8))
}

#[account]
pub struct Challenge {
    pub id: u8,
    pub uri: String,
    pub bump: u8,
}

impl Challenge {
    pub const LEN: usize =
        1 + // id
        4 + MAX_URI_LEN + // uri (borsh length prefix + bytes)
        1;  // bump

    pub fn validate_uri(uri: &str) -> std::result::Result<(), PixelChainError> {
        if uri.is_empty() {
            return Err(PixelChainError::EmptyUri);
        }
        if uri.len() > MAX_URI_LEN {
            return Err(PixelChainError::UriTooLong);
        }
        Ok(())
    }
}

#[account]
pub struct GameConfig {
    pub admin: Pubkey,
    pub challenge_count: u16,
    pub bump: u8,
}

impl GameConfig {
    pub const LEN: usize = 32 + 2 + 1;
}

/* ---------------------- EVENTS ---------------------- */

#[event]
pub struct PlayerInitialized {
    pub player: Pubkey,
    pub authority: Pubkey,
}

#[event]
pub struct ChallengeAdded {
    pub challenge_id: u8,
    pub uri: String,
}

#[event]
pub struct ChallengeCompleted {
    pub authority: Pubkey,
    pub challenge_id: u8,
    pub xp: u32,
    pub reward_mint: Pubkey,
}

/* ---------------------- ERRORS ---------------------- */

#[error_code]
pub enum PixelChainError {
    #[msg("Challenge already completed")]
    AlreadyCompleted,
    #[msg("XP would overflow")]
    XpOverflow,
    #[msg("Challenge uri exceeds the maximum length")]
    UriTooLong,
    #[msg("Challenge uri must not be empty")]
    EmptyUri,
    #[msg("Signer is not allowed to perform this action")]
    Unauthorized,
    #[msg("Too many challenges published")]
    ChallengeCountOverflow,
}
