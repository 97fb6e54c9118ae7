//! 工作日曆模型

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// 工作日曆
///
/// 計劃供應的開始日期依提前期在此日曆上回推。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkCalendar {
    /// 工作日（索引 0 = 週一, ..., 6 = 週日）
    pub working_days: [bool; 7],

    /// 節假日列表
    pub holidays: Vec<NaiveDate>,

    /// 日曆ID
    pub calendar_id: String,
}

impl WorkCalendar {
    /// 創建新的工作日曆（預設週一到週五為工作日）
    pub fn new(calendar_id: String) -> Self {
        Self {
            working_days: [true, true, true, true, true, false, false],
            holidays: Vec::new(),
            calendar_id,
        }
    }

    /// 創建 24/7 日曆（所有日子都是工作日）
    pub fn new_24_7(calendar_id: String) -> Self {
        Self {
            working_days: [true; 7],
            holidays: Vec::new(),
            calendar_id,
        }
    }

    /// 建構器模式：設置工作日
    pub fn with_working_days(mut self, working_days: [bool; 7]) -> Self {
        self.working_days = working_days;
        self
    }

    /// 添加節假日
    pub fn add_holiday(&mut self, date: NaiveDate) {
        if !self.holidays.contains(&date) {
            self.holidays.push(date);
            self.holidays.sort();
        }
    }

    /// 檢查是否為工作日
    pub fn is_working_day(&self, date: NaiveDate) -> bool {
        if self.holidays.contains(&date) {
            return false;
        }

        let weekday_index = date.weekday().num_days_from_monday() as usize;
        self.working_days[weekday_index]
    }

    /// 計算工作日（向前推算）
    pub fn add_working_days(&self, start_date: NaiveDate, days: u32) -> NaiveDate {
        let mut current = start_date;
        let mut remaining = days;

        while remaining > 0 {
            match current.succ_opt() {
                Some(next) => current = next,
                None => return current,
            }
            if self.is_working_day(current) {
                remaining -= 1;
            }
        }

        current
    }

    /// 計算工作日（向後推算，用於由交期回推開工/下單日）
    pub fn subtract_working_days(&self, start_date: NaiveDate, days: u32) -> NaiveDate {
        let mut current = start_date;
        let mut remaining = days;

        while remaining > 0 {
            match current.pred_opt() {
                Some(prev) => current = prev,
                None => return current,
            }
            if self.is_working_day(current) {
                remaining -= 1;
            }
        }

        current
    }
}
