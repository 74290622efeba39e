//! Grid Module
//!
//! 行・セル記述子（rowspan/colspan付き）から稠密なグリッド構造への変換を提供するモジュール。
//! グリッドは`row * width + col`でインデックスされるフラットな配列として所有され、
//! 結合領域の解決は記述子に対する純粋関数として行われます。

use std::collections::BTreeMap;

use crate::error::{ImportError, Result};
use crate::markup::{locate_first_table, parse_table_rows, RawRow};
use crate::types::{CellCoord, GridCell};

/// 再構築済みの時間割グリッド
///
/// 各位置は高々1つの`GridCell`で占有され、占有されない位置は空（`None`）です。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimetableGrid {
    /// グリッドデータ（`row * width + col`）
    cells: Vec<Option<GridCell>>,

    /// 行数
    height: usize,

    /// 列数
    width: usize,
}

impl TimetableGrid {
    /// マークアップ中の最初の表からグリッドを構築
    ///
    /// `max_span`はrowspan/colspanの上限です（通常は`SecurityConfig::max_span`）。
    ///
    /// # エラー
    ///
    /// 表が1つも含まれない場合は`ImportError::NoTableFound`を返します。
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use coursegrid::{assemble, AxisMap, TimetableGrid};
    ///
    /// let markup = "<table><tr><td>节次</td><td>时间</td><td>星期二</td></tr>\
    ///               <tr><td>1</td><td>08:00-09:40</td><td>化学</td></tr></table>";
    /// let grid = TimetableGrid::from_markup(markup, 64).unwrap();
    /// let axes = AxisMap::interpret(&grid);
    /// let timetable = assemble(&grid, &axes);
    ///
    /// assert_eq!(timetable.slots[0].day_of_week, 2);
    /// ```
    pub fn from_markup(markup: &str, max_span: usize) -> Result<Self> {
        let table = locate_first_table(markup).ok_or(ImportError::NoTableFound)?;
        Ok(Self::from_table(table, max_span))
    }

    /// `<table>`の内側のマークアップからグリッドを構築
    pub(crate) fn from_table(table: &str, max_span: usize) -> Self {
        Self::build(&parse_table_rows(table, max_span))
    }

    /// 行記述子から稠密なグリッドを構築
    ///
    /// 行は上から下へ、セルは左から右へ処理します。各セルを置く前に、
    /// 上の行の縦結合で既に埋まっている位置を読み飛ばします。
    /// R行×C列に結合されたセルはR×Cのすべての位置を埋め、原点のみが
    /// `is_placeholder = false`となります。既に埋まっている位置は上書きしません。
    ///
    /// 表の最終行を越える縦結合は、存在する行までに切り詰めます。
    pub(crate) fn build(rows: &[RawRow]) -> Self {
        let row_count = rows.len();

        // 1. スパースな配置
        let mut placed: BTreeMap<CellCoord, GridCell> = BTreeMap::new();

        for (row_idx, row) in rows.iter().enumerate() {
            let mut col = 0;

            for cell in &row.cells {
                while placed.contains_key(&CellCoord::new(row_idx, col)) {
                    col += 1;
                }

                let row_span = cell.row_span.max(1).min(row_count - row_idx);
                let col_span = cell.col_span.max(1);

                for dr in 0..row_span {
                    for dc in 0..col_span {
                        let coord = CellCoord::new(row_idx + dr, col + dc);
                        if placed.contains_key(&coord) {
                            continue;
                        }

                        let grid_cell = if dr == 0 && dc == 0 {
                            GridCell::origin(cell.text.clone(), row_span, col_span)
                        } else {
                            GridCell::placeholder(cell.text.clone())
                        };
                        placed.insert(coord, grid_cell);
                    }
                }

                col += col_span;
            }
        }

        // 2. グリッドサイズの決定
        let height = placed.keys().map(|c| c.row + 1).max().unwrap_or(0);
        let width = placed.keys().map(|c| c.col + 1).max().unwrap_or(0);

        // 3. 稠密な配列へ移す
        let mut cells = vec![None; height * width];
        for (coord, cell) in placed {
            cells[coord.row * width + coord.col] = Some(cell);
        }

        Self {
            cells,
            height,
            width,
        }
    }

    /// 指定位置のセルを取得（範囲外または空の場合は`None`）
    pub fn get(&self, row: usize, col: usize) -> Option<&GridCell> {
        if row >= self.height || col >= self.width {
            return None;
        }
        self.cells[row * self.width + col].as_ref()
    }

    /// セルのテキストを取得（空セルは空文字列）
    pub fn text(&self, row: usize, col: usize) -> &str {
        self.get(row, col).map(|c| c.text.as_str()).unwrap_or("")
    }

    /// 行数を取得
    pub fn get_rows(&self) -> usize {
        self.height
    }

    /// 列数を取得
    pub fn get_cols(&self) -> usize {
        self.width
    }
}
