//! 内存实现（测试与本地联调）
//!
//! 一个 `InMemoryStore` 同时实现全部存储 trait，并支持注入延迟与故障，
//! 用于验证超时与"数据不完整时绝不放行"的行为。

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicI64, Ordering},
        Mutex, MutexGuard,
    },
    time::Duration,
};

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::{
    domain::{
        AllocatedAddress, Asset, BlacklistAddress, Chain, EntryKind, LedgerEntry,
        NewLedgerEntry, NewWithdrawRequest, StatusUpdate, WithdrawRequest, WithdrawStatus,
    },
    error::{CoreError, CoreResult},
    repository::{
        AddressAllocator, ChainAssetResolver, ComplianceStore, KycRegistry, LedgerStore,
        RiskConfigStore, WithdrawRequestStore,
    },
};

#[derive(Default)]
struct Inner {
    ledger: Vec<LedgerEntry>,
    withdrawals: Vec<WithdrawRequest>,
    configs: HashMap<String, String>,
    blacklist: Vec<BlacklistAddress>,
    kyc_verified: HashSet<i64>,
    chains: Vec<Chain>,
    assets: Vec<Asset>,
    addresses: HashMap<(i64, i64, i64), (String, String)>,
}

pub struct InMemoryStore {
    inner: Mutex<Inner>,
    latency: Mutex<Duration>,
    failing: AtomicBool,
    next_id: AtomicI64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            latency: Mutex::new(Duration::ZERO),
            failing: AtomicBool::new(false),
            next_id: AtomicI64::new(1),
        }
    }

    fn state(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// 模拟一次存储往返：注入的延迟与故障在这里生效
    async fn round_trip(&self, operation: &str) -> Result<()> {
        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            bail!("in-memory store unavailable during {}", operation);
        }
        Ok(())
    }

    // ============ 故障注入 ============

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    // ============ 数据准备 ============

    pub fn insert_chain(&self, chain: Chain) {
        self.state().chains.push(chain);
    }

    pub fn insert_asset(&self, asset: Asset) {
        self.state().assets.push(asset);
    }

    pub fn set_config(&self, key: &str, value: &str) {
        self.state()
            .configs
            .insert(key.to_string(), value.to_string());
    }

    pub fn add_blacklist(&self, entry: BlacklistAddress) {
        self.state().blacklist.push(entry);
    }

    pub fn mark_kyc_verified(&self, user_id: i64) {
        self.state().kyc_verified.insert(user_id);
    }

    /// 以指定创建时间写入历史提现（构造时间窗口场景）
    pub fn insert_withdrawal_at(
        &self,
        request: NewWithdrawRequest,
        created_at: DateTime<Utc>,
    ) -> WithdrawRequest {
        let row = WithdrawRequest {
            id: self.next_id(),
            user_id: request.user_id,
            chain_id: request.chain_id,
            asset_id: request.asset_id,
            amount: request.amount,
            to_address: request.to_address,
            fee: request.fee,
            risk_score: request.risk_score,
            status: request.status,
            admin_notes: None,
            tx_hash: None,
            ledger_entry_id: None,
            settle_after: request.settle_after,
            created_at,
            processed_at: None,
        };
        self.state().withdrawals.push(row.clone());
        row
    }

    pub fn withdrawals(&self) -> Vec<WithdrawRequest> {
        self.state().withdrawals.clone()
    }

    pub fn ledger_entries(&self) -> Vec<LedgerEntry> {
        self.state().ledger.clone()
    }
}

fn committed_since<'a>(
    rows: &'a [WithdrawRequest],
    user_id: i64,
    since: DateTime<Utc>,
) -> impl Iterator<Item = &'a WithdrawRequest> {
    rows.iter()
        .filter(move |w| w.user_id == user_id && w.status.is_committed() && w.created_at > since)
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn append(&self, entry: NewLedgerEntry) -> CoreResult<LedgerEntry> {
        self.round_trip("ledger.append").await?;
        let mut state = self.state();

        if let Some(hash) = &entry.ref_tx_hash {
            if let Some(existing) = state
                .ledger
                .iter()
                .find(|e| e.ref_tx_hash.as_deref() == Some(hash.as_str()))
            {
                return Err(CoreError::DuplicateReference {
                    ref_tx_hash: hash.clone(),
                    existing_id: existing.id,
                });
            }
        }

        let row = LedgerEntry {
            id: self.next_id(),
            user_id: entry.user_id,
            kind: entry.kind,
            chain_id: entry.chain_id,
            asset_id: entry.asset_id,
            amount: entry.amount,
            kusd_delta: entry.kusd_delta,
            ref_tx_hash: entry.ref_tx_hash,
            batch_id: entry.batch_id,
            proof_root: entry.proof_root,
            created_at: Utc::now(),
        };
        state.ledger.push(row.clone());
        Ok(row)
    }

    async fn balance_of(&self, user_id: i64) -> Result<Decimal> {
        self.round_trip("ledger.balance_of").await?;
        Ok(self
            .state()
            .ledger
            .iter()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.kusd_delta)
            .sum())
    }

    async fn find_by_ref(&self, ref_tx_hash: &str) -> Result<Option<LedgerEntry>> {
        self.round_trip("ledger.find_by_ref").await?;
        Ok(self
            .state()
            .ledger
            .iter()
            .find(|e| e.ref_tx_hash.as_deref() == Some(ref_tx_hash))
            .cloned())
    }

    async fn list_by_user(
        &self,
        user_id: i64,
        kind: Option<EntryKind>,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<LedgerEntry>> {
        self.round_trip("ledger.list_by_user").await?;
        let state = self.state();
        // 插入顺序即创建顺序，倒序遍历得到最新在前
        Ok(state
            .ledger
            .iter()
            .rev()
            .filter(|e| e.user_id == user_id && kind.map_or(true, |k| e.kind == k))
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn sum_delta_since(
        &self,
        user_id: i64,
        kind: EntryKind,
        since: DateTime<Utc>,
    ) -> Result<Decimal> {
        self.round_trip("ledger.sum_delta_since").await?;
        Ok(self
            .state()
            .ledger
            .iter()
            .filter(|e| e.user_id == user_id && e.kind == kind && e.created_at > since)
            .map(|e| e.kusd_delta)
            .sum())
    }
}

#[async_trait]
impl WithdrawRequestStore for InMemoryStore {
    async fn create(&self, request: NewWithdrawRequest) -> Result<WithdrawRequest> {
        self.round_trip("withdraw.create").await?;
        Ok(self.insert_withdrawal_at(request, Utc::now()))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<WithdrawRequest>> {
        self.round_trip("withdraw.find_by_id").await?;
        Ok(self.state().withdrawals.iter().find(|w| w.id == id).cloned())
    }

    async fn list_by_user(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
    ) -> Result<Vec<WithdrawRequest>> {
        self.round_trip("withdraw.list_by_user").await?;
        Ok(self
            .state()
            .withdrawals
            .iter()
            .rev()
            .filter(|w| w.user_id == user_id)
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn committed_total_since(&self, user_id: i64, since: DateTime<Utc>) -> Result<Decimal> {
        self.round_trip("withdraw.committed_total_since").await?;
        let state = self.state();
        Ok(committed_since(&state.withdrawals, user_id, since)
            .map(|w| w.amount)
            .sum())
    }

    async fn committed_count_since(&self, user_id: i64, since: DateTime<Utc>) -> Result<i64> {
        self.round_trip("withdraw.committed_count_since").await?;
        let state = self.state();
        Ok(committed_since(&state.withdrawals, user_id, since).count() as i64)
    }

    async fn committed_average_since(
        &self,
        user_id: i64,
        since: DateTime<Utc>,
    ) -> Result<Decimal> {
        self.round_trip("withdraw.committed_average_since").await?;
        let state = self.state();
        let (total, count) = committed_since(&state.withdrawals, user_id, since)
            .fold((Decimal::ZERO, 0i64), |(t, c), w| (t + w.amount, c + 1));
        if count == 0 {
            return Ok(Decimal::ZERO);
        }
        Ok(total / Decimal::from(count))
    }

    async fn transition(
        &self,
        id: i64,
        from: WithdrawStatus,
        to: WithdrawStatus,
        update: StatusUpdate,
    ) -> Result<Option<WithdrawRequest>> {
        self.round_trip("withdraw.transition").await?;
        let mut state = self.state();
        let Some(row) = state
            .withdrawals
            .iter_mut()
            .find(|w| w.id == id && w.status == from)
        else {
            return Ok(None);
        };

        row.status = to;
        if update.admin_notes.is_some() {
            row.admin_notes = update.admin_notes;
        }
        if update.tx_hash.is_some() {
            row.tx_hash = update.tx_hash;
        }
        if update.ledger_entry_id.is_some() {
            row.ledger_entry_id = update.ledger_entry_id;
        }
        if to.is_terminal() {
            row.processed_at = Some(Utc::now());
        }
        Ok(Some(row.clone()))
    }
}

#[async_trait]
impl ComplianceStore for InMemoryStore {
    async fn find_active(&self, address: &str, chain_id: i64) -> Result<Option<BlacklistAddress>> {
        self.round_trip("blacklist.find_active").await?;
        Ok(self
            .state()
            .blacklist
            .iter()
            .find(|b| {
                b.is_active
                    && b.address.eq_ignore_ascii_case(address)
                    && b.chain_id.map_or(true, |c| c == chain_id)
            })
            .cloned())
    }
}

#[async_trait]
impl RiskConfigStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.round_trip("risk_config.get").await?;
        Ok(self.state().configs.get(key).cloned())
    }
}

#[async_trait]
impl KycRegistry for InMemoryStore {
    async fn is_verified(&self, user_id: i64) -> Result<bool> {
        self.round_trip("kyc.is_verified").await?;
        Ok(self.state().kyc_verified.contains(&user_id))
    }
}

#[async_trait]
impl ChainAssetResolver for InMemoryStore {
    async fn find_chain(&self, chain_key: &str) -> Result<Option<Chain>> {
        self.round_trip("chain.find").await?;
        Ok(self
            .state()
            .chains
            .iter()
            .find(|c| c.enabled && c.chain_key.eq_ignore_ascii_case(chain_key))
            .cloned())
    }

    async fn find_asset(&self, symbol: &str) -> Result<Option<Asset>> {
        self.round_trip("asset.find").await?;
        Ok(self
            .state()
            .assets
            .iter()
            .find(|a| a.enabled && a.symbol.eq_ignore_ascii_case(symbol))
            .cloned())
    }
}

#[async_trait]
impl AddressAllocator for InMemoryStore {
    async fn get_or_create(
        &self,
        user_id: i64,
        chain: &Chain,
        asset: &Asset,
    ) -> Result<AllocatedAddress> {
        self.round_trip("address.get_or_create").await?;
        let key = (user_id, chain.id, asset.id);
        let mut state = self.state();

        if let Some((address, path)) = state.addresses.get(&key) {
            return Ok(AllocatedAddress {
                address: address.clone(),
                derivation_path: path.clone(),
                freshly_created: false,
            });
        }

        let seq = self.next_id();
        let address = format!("0x{:040x}", seq);
        let path = format!("memory/{}/{}/{}", user_id, chain.chain_key, asset.symbol);
        state.addresses.insert(key, (address.clone(), path.clone()));

        Ok(AllocatedAddress {
            address,
            derivation_path: path,
            freshly_created: true,
        })
    }
}
