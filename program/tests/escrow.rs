use solana_program_test::{processor, BanksClientError, ProgramTest, ProgramTestContext};
use solana_sdk::{
    instruction::{Instruction, InstructionError},
    program_pack::Pack,
    pubkey::Pubkey,
    signature::{Keypair, Signer},
    system_instruction,
    transaction::{Transaction, TransactionError},
};
use spl_token::state::{Account as TokenAccount, Mint};

use two_party_escrow::{
    config::EscrowConfig,
    error::EscrowError,
    instruction,
    state::{EscrowRecord, EscrowState},
    vault::VaultSide,
};

const ALICE_X_SUPPLY: u64 = 1_000;
const BOB_Y_SUPPLY: u64 = 1_000;

struct Env {
    context: ProgramTestContext,
    config: EscrowConfig,
    alice: Keypair,
    bob: Keypair,
    alice_x: Pubkey,
    alice_y: Pubkey,
    bob_x: Pubkey,
    bob_y: Pubkey,
}

impl Env {
    async fn process(
        &mut self,
        instructions: &[Instruction],
        signers: &[&Keypair],
    ) -> Result<(), BanksClientError> {
        process(&mut self.context, instructions, signers).await
    }

    async fn initialize(&mut self) {
        let ix = instruction::initialize(&self.config).unwrap();
        let alice = self.alice.insecure_clone();
        self.process(&[ix], &[&alice]).await.unwrap();
    }

    async fn fund_a(&mut self, amount: u64) -> Result<(), BanksClientError> {
        let ix = instruction::fund_a(&self.config, &self.alice_x, amount).unwrap();
        let alice = self.alice.insecure_clone();
        self.process(&[ix], &[&alice]).await
    }

    async fn fund_b(&mut self, amount: u64) -> Result<(), BanksClientError> {
        let ix = instruction::fund_b(&self.config, &self.bob_y, amount).unwrap();
        let bob = self.bob.insecure_clone();
        self.process(&[ix], &[&bob]).await
    }

    async fn settle(&mut self, caller: &Keypair) -> Result<(), BanksClientError> {
        let ix =
            instruction::settle(&self.config, &caller.pubkey(), &self.alice_y, &self.bob_x).unwrap();
        self.process(&[ix], &[caller]).await
    }

    async fn cancel(&mut self, caller: &Keypair) -> Result<(), BanksClientError> {
        let ix =
            instruction::cancel(&self.config, &caller.pubkey(), &self.alice_x, &self.bob_y).unwrap();
        self.process(&[ix], &[caller]).await
    }

    async fn balance(&mut self, address: Pubkey) -> u64 {
        let account = self
            .context
            .banks_client
            .get_account(address)
            .await
            .unwrap()
            .unwrap();
        TokenAccount::unpack(&account.data).unwrap().amount
    }

    async fn vault_balance(&mut self, side: VaultSide) -> u64 {
        let address = self.config.vault_address(side).unwrap();
        self.balance(address).await
    }

    async fn record(&mut self) -> EscrowRecord {
        let address = self.config.escrow_address().unwrap();
        let account = self
            .context
            .banks_client
            .get_account(address)
            .await
            .unwrap()
            .unwrap();
        EscrowRecord::unpack(&account.data).unwrap()
    }
}

async fn process(
    context: &mut ProgramTestContext,
    instructions: &[Instruction],
    signers: &[&Keypair],
) -> Result<(), BanksClientError> {
    let blockhash = context.banks_client.get_latest_blockhash().await?;
    let mut signing_keys: Vec<&Keypair> = vec![&context.payer];
    signing_keys.extend_from_slice(signers);
    let transaction = Transaction::new_signed_with_payer(
        instructions,
        Some(&context.payer.pubkey()),
        &signing_keys,
        blockhash,
    );
    context.banks_client.process_transaction(transaction).await
}

async fn create_mint(context: &mut ProgramTestContext, authority: &Pubkey) -> Pubkey {
    let mint = Keypair::new();
    let rent = context.banks_client.get_rent().await.unwrap();
    let instructions = [
        system_instruction::create_account(
            &context.payer.pubkey(),
            &mint.pubkey(),
            rent.minimum_balance(Mint::LEN),
            Mint::LEN as u64,
            &spl_token::id(),
        ),
        spl_token::instruction::initialize_mint(&spl_token::id(), &mint.pubkey(), authority, None, 0)
            .unwrap(),
    ];
    process(context, &instructions, &[&mint]).await.unwrap();
    mint.pubkey()
}

async fn create_token_account(
    context: &mut ProgramTestContext,
    mint: &Pubkey,
    owner: &Pubkey,
) -> Pubkey {
    let account = Keypair::new();
    let rent = context.banks_client.get_rent().await.unwrap();
    let instructions = [
        system_instruction::create_account(
            &context.payer.pubkey(),
            &account.pubkey(),
            rent.minimum_balance(TokenAccount::LEN),
            TokenAccount::LEN as u64,
            &spl_token::id(),
        ),
        spl_token::instruction::initialize_account(&spl_token::id(), &account.pubkey(), mint, owner)
            .unwrap(),
    ];
    process(context, &instructions, &[&account]).await.unwrap();
    account.pubkey()
}

async fn mint_to(
    context: &mut ProgramTestContext,
    mint: &Pubkey,
    destination: &Pubkey,
    authority: &Keypair,
    amount: u64,
) {
    let ix = spl_token::instruction::mint_to(
        &spl_token::id(),
        mint,
        destination,
        &authority.pubkey(),
        &[],
        amount,
    )
    .unwrap();
    process(context, &[ix], &[authority]).await.unwrap();
}

async fn setup() -> Env {
    let program_test = ProgramTest::new(
        "two_party_escrow",
        two_party_escrow::id(),
        processor!(two_party_escrow::process_instruction),
    );
    let mut context = program_test.start_with_context().await;

    let alice = Keypair::new();
    let bob = Keypair::new();
    let fund_parties = [
        system_instruction::transfer(&context.payer.pubkey(), &alice.pubkey(), 1_000_000_000),
        system_instruction::transfer(&context.payer.pubkey(), &bob.pubkey(), 1_000_000_000),
    ];
    process(&mut context, &fund_parties, &[]).await.unwrap();

    let mint_authority = Keypair::new();
    let mint_x = create_mint(&mut context, &mint_authority.pubkey()).await;
    let mint_y = create_mint(&mut context, &mint_authority.pubkey()).await;

    let alice_x = create_token_account(&mut context, &mint_x, &alice.pubkey()).await;
    let alice_y = create_token_account(&mut context, &mint_y, &alice.pubkey()).await;
    let bob_x = create_token_account(&mut context, &mint_x, &bob.pubkey()).await;
    let bob_y = create_token_account(&mut context, &mint_y, &bob.pubkey()).await;

    mint_to(&mut context, &mint_x, &alice_x, &mint_authority, ALICE_X_SUPPLY).await;
    mint_to(&mut context, &mint_y, &bob_y, &mint_authority, BOB_Y_SUPPLY).await;

    let config = EscrowConfig::new(alice.pubkey(), bob.pubkey(), mint_x, mint_y);

    Env {
        context,
        config,
        alice,
        bob,
        alice_x,
        alice_y,
        bob_x,
        bob_y,
    }
}

fn escrow_error(error: EscrowError) -> TransactionError {
    TransactionError::InstructionError(0, InstructionError::Custom(error as u32))
}

#[tokio::test]
async fn settle_swaps_100_x_for_250_y() {
    let mut env = setup().await;
    env.initialize().await;

    let record = env.record().await;
    assert_eq!(record.state, EscrowState::Uninitialized);
    assert_eq!(record.party_a, env.alice.pubkey());
    assert_eq!(record.party_b, env.bob.pubkey());
    assert_eq!(record.vault_x, env.config.vault_address(VaultSide::X).unwrap());
    assert_eq!(record.token_y_mint, env.config.mint_y);

    env.fund_a(100).await.unwrap();
    assert_eq!(env.vault_balance(VaultSide::X).await, 100);
    env.fund_b(250).await.unwrap();
    assert_eq!(env.vault_balance(VaultSide::Y).await, 250);
    assert_eq!(env.record().await.state, EscrowState::FundedBoth);

    let alice = env.alice.insecure_clone();
    env.settle(&alice).await.unwrap();

    assert_eq!(env.balance(env.alice_y).await, 250);
    assert_eq!(env.balance(env.bob_x).await, 100);
    assert_eq!(env.balance(env.alice_x).await, ALICE_X_SUPPLY - 100);
    assert_eq!(env.balance(env.bob_y).await, BOB_Y_SUPPLY - 250);
    assert_eq!(env.vault_balance(VaultSide::X).await, 0);
    assert_eq!(env.vault_balance(VaultSide::Y).await, 0);

    let record = env.record().await;
    assert_eq!(record.state, EscrowState::Settled);
    assert_eq!((record.amount_a, record.amount_b), (100, 250));
}

#[tokio::test]
async fn fund_a_from_bob_is_unauthorized() {
    let mut env = setup().await;
    env.initialize().await;

    let mut ix = instruction::fund_a(&env.config, &env.alice_x, 10).unwrap();
    ix.accounts[1].pubkey = env.bob.pubkey();
    let bob = env.bob.insecure_clone();
    let err = env.process(&[ix], &[&bob]).await.unwrap_err();
    assert_eq!(err.unwrap(), escrow_error(EscrowError::Unauthorized));

    let record = env.record().await;
    assert_eq!(record.state, EscrowState::Uninitialized);
    assert_eq!(record.amount_a, 0);
    assert_eq!(env.vault_balance(VaultSide::X).await, 0);
    assert_eq!(env.balance(env.alice_x).await, ALICE_X_SUPPLY);
}

#[tokio::test]
async fn fund_a_without_signature_is_rejected() {
    let mut env = setup().await;
    env.initialize().await;

    let mut ix = instruction::fund_a(&env.config, &env.alice_x, 10).unwrap();
    ix.accounts[1].is_signer = false;
    let err = env.process(&[ix], &[]).await.unwrap_err();
    assert_eq!(
        err.unwrap(),
        TransactionError::InstructionError(0, InstructionError::MissingRequiredSignature)
    );
}

#[tokio::test]
async fn settle_while_funded_a_is_invalid_state() {
    let mut env = setup().await;
    env.initialize().await;
    env.fund_a(100).await.unwrap();

    let alice = env.alice.insecure_clone();
    let err = env.settle(&alice).await.unwrap_err();
    assert_eq!(err.unwrap(), escrow_error(EscrowError::InvalidState));
    assert_eq!(env.record().await.state, EscrowState::FundedA);
    assert_eq!(env.vault_balance(VaultSide::X).await, 100);
}

#[tokio::test]
async fn cancel_after_funded_a_refunds_alice() {
    let mut env = setup().await;
    env.initialize().await;
    env.fund_a(100).await.unwrap();
    assert_eq!(env.balance(env.alice_x).await, ALICE_X_SUPPLY - 100);

    let bob = env.bob.insecure_clone();
    let err = env.cancel(&bob).await.unwrap_err();
    assert_eq!(err.unwrap(), escrow_error(EscrowError::Unauthorized));

    let alice = env.alice.insecure_clone();
    env.cancel(&alice).await.unwrap();
    assert_eq!(env.balance(env.alice_x).await, ALICE_X_SUPPLY);
    assert_eq!(env.vault_balance(VaultSide::X).await, 0);
    assert_eq!(env.record().await.state, EscrowState::Cancelled);

    let err = env.fund_b(5).await.unwrap_err();
    assert_eq!(err.unwrap(), escrow_error(EscrowError::InvalidState));
}

#[tokio::test]
async fn cancel_after_both_funded_refunds_each_depositor() {
    let mut env = setup().await;
    env.initialize().await;
    env.fund_a(30).await.unwrap();
    env.fund_b(70).await.unwrap();

    let bob = env.bob.insecure_clone();
    env.cancel(&bob).await.unwrap();

    assert_eq!(env.balance(env.alice_x).await, ALICE_X_SUPPLY);
    assert_eq!(env.balance(env.bob_y).await, BOB_Y_SUPPLY);
    assert_eq!(env.balance(env.alice_y).await, 0);
    assert_eq!(env.balance(env.bob_x).await, 0);
    assert_eq!(env.vault_balance(VaultSide::X).await, 0);
    assert_eq!(env.vault_balance(VaultSide::Y).await, 0);

    let alice = env.alice.insecure_clone();
    let err = env.settle(&alice).await.unwrap_err();
    assert_eq!(err.unwrap(), escrow_error(EscrowError::InvalidState));
}

#[tokio::test]
async fn initialize_twice_keeps_first_record() {
    let mut env = setup().await;
    env.initialize().await;
    env.fund_a(42).await.unwrap();
    let first = env.record().await;

    env.context.get_new_latest_blockhash().await.unwrap();
    let ix = instruction::initialize(&env.config).unwrap();
    let alice = env.alice.insecure_clone();
    let err = env.process(&[ix], &[&alice]).await.unwrap_err();
    assert_eq!(err.unwrap(), escrow_error(EscrowError::AlreadyInitialized));
    assert_eq!(env.record().await, first);
}

#[tokio::test]
async fn deposits_above_balance_or_zero_are_rejected() {
    let mut env = setup().await;
    env.initialize().await;

    let err = env.fund_a(ALICE_X_SUPPLY + 1).await.unwrap_err();
    assert_eq!(err.unwrap(), escrow_error(EscrowError::InsufficientFunds));

    let err = env.fund_a(0).await.unwrap_err();
    assert_eq!(err.unwrap(), escrow_error(EscrowError::InvalidAmount));

    assert_eq!(env.record().await.state, EscrowState::Uninitialized);
}

#[tokio::test]
async fn foreign_vault_is_derivation_mismatch() {
    let mut env = setup().await;
    env.initialize().await;

    let mut ix = instruction::fund_a(&env.config, &env.alice_x, 10).unwrap();
    ix.accounts[3].pubkey = env.bob_x;
    let alice = env.alice.insecure_clone();
    let err = env.process(&[ix], &[&alice]).await.unwrap_err();
    assert_eq!(err.unwrap(), escrow_error(EscrowError::DerivationMismatch));
    assert_eq!(env.balance(env.bob_x).await, 0);
}

#[tokio::test]
async fn settle_to_wrong_recipient_moves_nothing() {
    let mut env = setup().await;
    env.initialize().await;
    env.fund_a(100).await.unwrap();
    env.fund_b(250).await.unwrap();

    // token X must go to Bob, not back to Alice
    let bob = env.bob.insecure_clone();
    let ix = instruction::settle(&env.config, &bob.pubkey(), &env.alice_y, &env.alice_x).unwrap();
    let err = env.process(&[ix], &[&bob]).await.unwrap_err();
    assert_eq!(err.unwrap(), escrow_error(EscrowError::InvalidTokenAccount));

    assert_eq!(env.vault_balance(VaultSide::X).await, 100);
    assert_eq!(env.vault_balance(VaultSide::Y).await, 250);
    assert_eq!(env.record().await.state, EscrowState::FundedBoth);
}

#[tokio::test]
async fn settle_empties_vault_holding_a_donation() {
    let mut env = setup().await;
    env.initialize().await;
    env.fund_a(100).await.unwrap();
    env.fund_b(250).await.unwrap();

    let vault_x = env.config.vault_address(VaultSide::X).unwrap();
    let donation = spl_token::instruction::transfer(
        &spl_token::id(),
        &env.alice_x,
        &vault_x,
        &env.alice.pubkey(),
        &[],
        1,
    )
    .unwrap();
    let alice = env.alice.insecure_clone();
    env.process(&[donation], &[&alice]).await.unwrap();
    assert_eq!(env.vault_balance(VaultSide::X).await, 101);

    env.settle(&alice).await.unwrap();

    assert_eq!(env.balance(env.bob_x).await, 101);
    assert_eq!(env.balance(env.alice_y).await, 250);
    assert_eq!(env.vault_balance(VaultSide::X).await, 0);
    assert_eq!(env.vault_balance(VaultSide::Y).await, 0);
}

#[tokio::test]
async fn cancel_returns_donation_to_unfunded_side() {
    let mut env = setup().await;
    env.initialize().await;
    env.fund_a(100).await.unwrap();

    let vault_y = env.config.vault_address(VaultSide::Y).unwrap();
    let donation = spl_token::instruction::transfer(
        &spl_token::id(),
        &env.bob_y,
        &vault_y,
        &env.bob.pubkey(),
        &[],
        5,
    )
    .unwrap();
    let bob = env.bob.insecure_clone();
    env.process(&[donation], &[&bob]).await.unwrap();

    let alice = env.alice.insecure_clone();
    env.cancel(&alice).await.unwrap();

    assert_eq!(env.balance(env.alice_x).await, ALICE_X_SUPPLY);
    assert_eq!(env.balance(env.bob_y).await, BOB_Y_SUPPLY);
    assert_eq!(env.vault_balance(VaultSide::X).await, 0);
    assert_eq!(env.vault_balance(VaultSide::Y).await, 0);
}

#[tokio::test]
async fn read_only_vault_is_not_writable() {
    let mut env = setup().await;
    env.initialize().await;

    let mut ix = instruction::fund_a(&env.config, &env.alice_x, 10).unwrap();
    ix.accounts[3].is_writable = false;
    let alice = env.alice.insecure_clone();
    let err = env.process(&[ix], &[&alice]).await.unwrap_err();
    assert_eq!(err.unwrap(), escrow_error(EscrowError::AccountNotWritable));
    assert_eq!(env.record().await.state, EscrowState::Uninitialized);
}

#[tokio::test]
async fn fund_a_with_mint_y_is_mint_mismatch() {
    let mut env = setup().await;
    env.initialize().await;

    let mut ix = instruction::fund_a(&env.config, &env.alice_x, 10).unwrap();
    ix.accounts[4].pubkey = env.config.mint_y;
    let alice = env.alice.insecure_clone();
    let err = env.process(&[ix], &[&alice]).await.unwrap_err();
    assert_eq!(err.unwrap(), escrow_error(EscrowError::MintMismatch));
    assert_eq!(env.vault_balance(VaultSide::X).await, 0);
}

#[tokio::test]
async fn short_account_list_is_rejected() {
    let mut env = setup().await;
    env.initialize().await;

    let mut ix = instruction::fund_a(&env.config, &env.alice_x, 10).unwrap();
    ix.accounts.pop();
    let alice = env.alice.insecure_clone();
    let err = env.process(&[ix], &[&alice]).await.unwrap_err();
    assert_eq!(
        err.unwrap(),
        TransactionError::InstructionError(0, InstructionError::NotEnoughAccountKeys)
    );
}

#[tokio::test]
async fn prefunded_derived_addresses_still_initialize() {
    let mut env = setup().await;

    let payer = env.context.payer.pubkey();
    let escrow = env.config.escrow_address().unwrap();
    let vault_x = env.config.vault_address(VaultSide::X).unwrap();
    let prefund = [
        system_instruction::transfer(&payer, &escrow, 1_000_000),
        system_instruction::transfer(&payer, &vault_x, 10_000_000),
    ];
    env.process(&prefund, &[]).await.unwrap();

    env.initialize().await;
    env.fund_a(100).await.unwrap();

    let record = env.record().await;
    assert_eq!(record.state, EscrowState::FundedA);
    assert_eq!(record.vault_x, vault_x);
    assert_eq!(env.vault_balance(VaultSide::X).await, 100);
}
