use anyhow::{Result, anyhow};

fn main() -> Result<()> {
    let mut book = umya_spreadsheet::new_file_empty_worksheet();
    let sheet = book.new_sheet("CF Rules").map_err(|e| anyhow!(e))?;

    let rows: [[&str; 10]; 4] = [
        [
            "Start Column",
            "End Column",
            "Formula",
            "Stop If True",
            "BG Color",
            "BG RGB",
            "Font Color",
            "Font RGB",
            "Number Format",
            "Worksheet",
        ],
        ["A", "D", "=$A@ROW@=\"FAIL\"", "Y", "Red", "", "White", "", "", "Data"],
        ["E", "E", "=$E@ROW@<0", "", "", "'255,199,206'", "DarkRed", "", "0.00", "Data"],
        ["B", "C", "=B@ROW@>100", "", "LightGreen", "", "", "", "", "Summary"],
    ];

    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            sheet
                .get_cell_mut(((c + 1) as u32, (r + 1) as u32))
                .set_value(*value);
        }
    }

    umya_spreadsheet::writer::xlsx::write(&book, "cf_rules.xlsx")?;
    println!("Wrote cf_rules.xlsx");
    Ok(())
}
