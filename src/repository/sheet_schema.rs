//! Table layouts of the quotation spreadsheet.
//!
//! Names and headers match the spreadsheet the system was first deployed on.
//! The quotations table only appends a trailing column, so rows of an
//! existing workbook still parse in place.

use crate::repository::sheet_store::SheetSpec;

pub const CUSTOMERS: SheetSpec = SheetSpec {
    name: "客戶資料",
    title: "📋 客戶資料 Customer Database",
    headers: &["客戶編號", "公司名稱", "聯絡人", "電話", "Email", "地址", "統一編號", "備註", "建立日期"],
};

/// The first fifteen columns keep their original positions. Column 0 is the
/// quotation key that line items and milestones reference. The trailing
/// column holds the display number when it differs from the key; rows written
/// before it existed leave it blank.
pub const QUOTATIONS: SheetSpec = SheetSpec {
    name: "報價單",
    title: "📋 報價單 Quotations",
    headers: &[
        "報價單號", "客戶編號", "客戶名稱", "聯絡人", "電話", "Email", "地址", "專案名稱",
        "專案類型", "稅率(%)", "狀態", "建立日期", "有效期限", "付款條件", "備註", "顯示單號",
    ],
};

/// Columns of the quotations table that predate the display-number column.
pub const LEGACY_QUOTATION_WIDTH: usize = 15;

pub const LINE_ITEMS: SheetSpec = SheetSpec {
    name: "報價項目",
    title: "📋 報價項目 Quotation Items",
    headers: &["報價單號", "項目名稱", "說明", "數量", "單位", "單價", "小計"],
};

pub const MILESTONES: SheetSpec = SheetSpec {
    name: "期程里程碑",
    title: "📋 期程里程碑 Project Milestones",
    headers: &["報價單號", "週次", "里程碑標題", "工作項目"],
};

pub const NOTE_TEMPLATES: SheetSpec = SheetSpec {
    name: "備註模板",
    title: "📋 備註模板 Notes Templates",
    headers: &["模板ID", "模板名稱", "備註內容"],
};

pub const SERVICES: SheetSpec = SheetSpec {
    name: "服務產品庫",
    title: "📦 服務產品庫 Services Library",
    headers: &["服務ID", "服務名稱", "說明", "單位", "單價"],
};

/// Column that links dependent rows back to their quotation.
pub const QUOTE_KEY_COLUMN: usize = 0;
