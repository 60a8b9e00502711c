/// 月単位の日付操作
pub mod month;

pub use month::{
    current_month_start, first_day_of_month, format_month_year, months_between,
    parse_month_year,
};
