//! Compile-time–checked column identifiers for all tables.

use sea_query::Iden;

#[derive(Iden)]
pub enum Plans {
    Table,
    Id,
    Name,
    PriceMonthly,
    MaxStudents,
    Description,
    CreatedAt,
}

#[derive(Iden)]
pub enum Tenants {
    Table,
    Id,
    Name,
    Slug,
    Email,
    Phone,
    Address,
    PlanId,
    Status,
    CreatedAt,
}

#[derive(Iden)]
pub enum Users {
    Table,
    Id,
    TenantId,
    Email,
    Name,
    Role,
    PasswordHash,
    PasswordSalt,
    CreatedAt,
}

#[derive(Iden)]
pub enum Teachers {
    Table,
    Id,
    TenantId,
    FirstName,
    LastName,
    Email,
    Phone,
    Subject,
    CreatedAt,
}

#[derive(Iden)]
pub enum Classes {
    Table,
    Id,
    TenantId,
    Name,
    Level,
    TeacherId,
    CreatedAt,
}

#[derive(Iden)]
pub enum Students {
    Table,
    Id,
    TenantId,
    ClassId,
    FirstName,
    LastName,
    AdmissionNumber,
    DateOfBirth,
    Gender,
    GuardianName,
    GuardianPhone,
    Status,
    DeletedAt,
    CreatedAt,
}

#[derive(Iden)]
pub enum Payments {
    Table,
    Id,
    TenantId,
    StudentId,
    Description,
    Amount,
    PaidAmount,
    Status,
    DueDate,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum Attendance {
    Table,
    Id,
    TenantId,
    StudentId,
    ClassId,
    Date,
    Status,
    Remarks,
    MarkedBy,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
pub enum Leads {
    Table,
    Id,
    SchoolName,
    ContactName,
    Email,
    Phone,
    Stage,
    Value,
    Notes,
    CreatedAt,
}

#[derive(Iden)]
pub enum Announcements {
    Table,
    Id,
    TenantId,
    Title,
    Body,
    CreatedBy,
    CreatedAt,
}
