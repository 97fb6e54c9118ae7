//! # planner
//!
//! 多租戶製造 ERP 的製造方法與需求計劃引擎。
//!
//! 工作區成員：
//! - `plan-core`：實體模型（物料、方法樹、需求/供應、日曆）
//! - `plan-method`：方法樹服務（儲存、重算、工序排序、版本化、報價流轉）
//! - `plan-mrp`：MRP 引擎（淨算、批量、波次展開、排程掛鉤）

pub use plan_core as core;
pub use plan_method as method;
pub use plan_mrp as mrp;
