//! Job configuration commands.

use std::io::Write;

use anyhow::Result;

use ta_core::costcode::{CostCode, CostCodeService, JobAssignment};
use ta_core::types::EmployeeNumber;
use ta_db::Database;

pub fn require<W: Write>(
    writer: &mut W,
    db: &Database,
    emp_num: EmployeeNumber,
    job_code: u32,
    assignment: JobAssignment,
) -> Result<()> {
    db.upsert_assignment(emp_num, job_code, assignment)?;
    writeln!(
        writer,
        "Updated requirements for employee {emp_num} on job {job_code}"
    )?;
    Ok(())
}

pub fn add_cost_code<W: Write>(writer: &mut W, db: &Database, code: &CostCode) -> Result<()> {
    db.insert_cost_code(code)?;
    writeln!(
        writer,
        "Registered cost code {} for job {}{}",
        code.code_string(),
        code.job_code,
        if code.active { "" } else { " (inactive)" }
    )?;
    Ok(())
}

pub fn show<W: Write>(
    writer: &mut W,
    db: &Database,
    emp_num: EmployeeNumber,
    job_code: u32,
) -> Result<()> {
    let service = CostCodeService::new(db);
    let requirements = service.job_requirements(emp_num, job_code);

    writeln!(writer, "Requirements for employee {emp_num} on job {job_code}")?;
    writeln!(writer, "  clockable: {}", yes_no(requirements.clockable))?;
    writeln!(
        writer,
        "  cost code required: {}",
        yes_no(requirements.cost_code_required)
    )?;
    writeln!(
        writer,
        "  quantity required: {}",
        yes_no(requirements.quantity_required)
    )?;
    writeln!(
        writer,
        "  split code required: {}",
        yes_no(requirements.split_code_required)
    )?;

    let codes = service.cost_codes_for_job(job_code);
    if codes.is_empty() {
        writeln!(writer, "No active cost codes.")?;
    } else {
        writeln!(writer, "Active cost codes:")?;
        for code in codes {
            writeln!(writer, "  {}", code.code_string())?;
        }
    }
    Ok(())
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
