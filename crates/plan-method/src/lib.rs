//! # plan-method
//!
//! 製造方法樹服務：儲存介面、需求數量重算、工序依賴排序、
//! 版本化深拷貝與報價方法具體化。
//!
//! ## 核心能力
//!
//! - **方法樹儲存**：`MethodStore` / `PlanningStore` 介面與記憶體內實作
//! - **數量重算**：由上而下覆寫整棵樹的計算需求量（冪等）
//! - **工序排序**：依賴圖建構、循環偵測與正規化重編號
//! - **版本化**：id-map 深拷貝、版本建立與晉升
//! - **報價流轉**：報價行方法配置、回寫與報價轉單

pub mod copy;
pub mod ordering;
pub mod quote;
pub mod recalc;
pub mod store;
pub mod tree;

pub use copy::MethodVersionService;
pub use ordering::{OperationDependencyResolver, OperationGraph, OrderBatchResult, OrderUpdate};
pub use quote::{ConvertQuoteRequest, QuoteConversion, QuoteMaterializer};
pub use recalc::QuantityRecalculator;
pub use store::{InMemoryStore, MethodStore, PlanningStore};
pub use tree::{collect_subtree, ensure_acyclic_link, MethodSubtree};
